use uuid::Uuid;

/// Fresh correlation id: a random (v4) UUID in hyphenated form.
///
/// 122 random bits make collisions within one connection negligible.
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}
