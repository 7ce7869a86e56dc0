/// Chatdesk capability tokens.
///
/// A conversation id is a random salt followed by the SHA-1 of
/// `salt || fingerprint`. Holding the id is what grants access to the
/// conversation; the fingerprint binding can optionally be re-checked.

pub mod token;
