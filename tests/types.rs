// ABOUTME: Integration tests for validated identifier types.
// ABOUTME: Tests parsing, validation, and deserialization of service names and env keys.

use stevedore::types::*;

mod service_name_tests {
    use super::*;

    #[test]
    fn valid_dns_name() {
        let name = ServiceName::new("my-service").unwrap();
        assert_eq!(name.as_str(), "my-service");
    }

    #[test]
    fn empty_returns_error() {
        assert!(ServiceName::new("").is_err());
    }

    #[test]
    fn too_long_returns_error() {
        let long_name = "a".repeat(64);
        assert!(ServiceName::new(&long_name).is_err());
    }

    #[test]
    fn valid_63_chars() {
        let name = "a".repeat(63);
        assert!(ServiceName::new(&name).is_ok());
    }

    #[test]
    fn hyphen_at_either_end_returns_error() {
        assert!(ServiceName::new("-service").is_err());
        assert!(ServiceName::new("service-").is_err());
    }

    #[test]
    fn uppercase_returns_error() {
        assert!(ServiceName::new("MyService").is_err());
    }

    #[test]
    fn path_characters_return_error() {
        assert!(ServiceName::new("../etc").is_err());
        assert!(ServiceName::new("api/v2").is_err());
    }

    #[test]
    fn deserializes_with_validation() {
        let name: ServiceName = serde_yaml::from_str("qscrap-api").unwrap();
        assert_eq!(name.to_string(), "qscrap-api");
        assert!(serde_yaml::from_str::<ServiceName>("Bad_Name").is_err());
    }
}

mod env_key_tests {
    use super::*;

    #[test]
    fn accepts_conventional_keys() {
        for key in ["JWT_SECRET", "_PRIVATE", "db_url", "KEY2"] {
            assert_eq!(EnvKey::new(key).unwrap().as_str(), key);
        }
    }

    #[test]
    fn rejects_shell_metacharacters() {
        assert_eq!(EnvKey::new("A B"), Err(EnvKeyError::InvalidChar(' ')));
        assert_eq!(EnvKey::new("A$B"), Err(EnvKeyError::InvalidChar('$')));
        assert_eq!(EnvKey::new("A.B"), Err(EnvKeyError::InvalidChar('.')));
    }

    #[test]
    fn rejects_leading_digit_and_empty() {
        assert_eq!(EnvKey::new("9LIVES"), Err(EnvKeyError::StartsWithDigit));
        assert_eq!(EnvKey::new(""), Err(EnvKeyError::Empty));
    }

    #[test]
    fn deserializes_with_validation() {
        let key: EnvKey = serde_yaml::from_str("SESSION_KEY").unwrap();
        assert_eq!(key.to_string(), "SESSION_KEY");
        assert!(serde_yaml::from_str::<EnvKey>("SESSION-KEY").is_err());
    }
}
