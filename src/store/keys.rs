pub fn schedule_state_key(user_id: &str, word_id: &str) -> String {
    format!("{}:{}", user_id, word_id)
}

pub fn schedule_state_prefix(user_id: &str) -> String {
    format!("{}:", user_id)
}
