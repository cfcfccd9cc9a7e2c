//! Custom assertions for timing-sensitive tests

use std::time::Duration;

/// Assert that a result is an error whose display contains a substring
///
/// # Examples
///
/// ```
/// use rebound_common::assert_error_contains;
///
/// let result: Result<(), String> = Err("connection timed out".to_string());
/// assert_error_contains!(result, "timed out");
/// ```
#[macro_export]
macro_rules! assert_error_contains {
    ($result:expr, $substring:expr) => {
        match $result {
            Ok(_) => panic!("Expected error containing '{}', got Ok", $substring),
            Err(e) => {
                let message = e.to_string();
                assert!(
                    message.contains($substring),
                    "Error message '{}' does not contain '{}'",
                    message,
                    $substring
                );
            }
        }
    };
}

/// Assert that `actual` lies in the closed range `[min, max]`
pub fn assert_duration_between(actual: Duration, min: Duration, max: Duration) {
    assert!(
        actual >= min && actual <= max,
        "Duration {:?} not in range [{:?}, {:?}]",
        actual,
        min,
        max
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_between_accepts_bounds() {
        assert_duration_between(
            Duration::from_millis(750),
            Duration::from_millis(750),
            Duration::from_millis(1250),
        );
    }

    #[test]
    #[should_panic(expected = "not in range")]
    fn test_duration_between_rejects_outside() {
        assert_duration_between(Duration::from_secs(2), Duration::ZERO, Duration::from_secs(1));
    }

    #[test]
    fn test_error_contains_macro() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
        assert_error_contains!(result, "reset");
    }
}
