use uuid::Uuid;

/// Returns a fresh random UUID.
pub fn new_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Returns a fresh random UUID rendered without hyphens.
pub fn new_uuid_string() -> String {
    new_uuid().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_strings_are_unique_and_compact() {
        let a = new_uuid_string();
        let b = new_uuid_string();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(!a.contains('-'));
    }
}
