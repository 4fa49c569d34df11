//! Message body fixtures

/// Three plain bodies
pub const ABC: [&str; 3] = ["a", "b", "c"];

/// User-record bodies as the demo producer would send them
pub const USER_BODIES: [&str; 3] = [
    r#"{"first_name":"Ada","last_name":"Lovelace","email":"ada.lovelace12@example.com","created_at":"1985-04-12"}"#,
    r#"{"first_name":"Zoë","last_name":"Müller","email":"zoë.müller7@example.org","created_at":"2001-09-30"}"#,
    r#"{"first_name":"Grace","last_name":"Hopper","email":"grace.hopper3@example.net","created_at":"2019-01-01"}"#,
];

/// `count` distinct bodies `m0`, `m1`, ...
pub fn numbered_bodies(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("m{i}")).collect()
}
