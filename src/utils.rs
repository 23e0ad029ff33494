use std::any::Any;

/// Extracts the message of a panic payload
/// `panic!` with a literal carries a `&'static str`, formatted panics carry a `String`
/// Any other payload type has no readable message
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
