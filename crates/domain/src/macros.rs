//! Display/FromStr generation for label-like enums
//!
//! Partitions, log formats and similar enums travel through config files,
//! store keys and metric labels as lowercase strings. The macro keeps the
//! two directions in one table.
//!
//! # Example
//!
//! ```rust
//! use rebound_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Lane {
//!     Fast,
//!     Slow,
//! }
//!
//! impl_domain_status_conversions!(Lane {
//!     Fast => "fast",
//!     Slow => "slow",
//! });
//!
//! assert_eq!("FAST".parse::<Lane>().unwrap(), Lane::Fast);
//! ```

/// Implements `Display` and case-insensitive `FromStr` for a fieldless enum
///
/// Parsing failures return [`ReboundError::InvalidInput`](crate::ReboundError)
/// naming the enum and the rejected input.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Lowercase label for keys and metrics
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = $crate::errors::ReboundError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err($crate::errors::ReboundError::InvalidInput(format!(
                        "invalid {}: '{}'",
                        stringify!($enum_name),
                        s
                    ))),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::errors::ReboundError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Lane {
        Fast,
        Slow,
    }

    impl_domain_status_conversions!(Lane {
        Fast => "fast",
        Slow => "slow",
    });

    mod aliased_result {
        // A single-parameter alias must not leak into the generated impls
        #[allow(dead_code)]
        type Result<T> = std::result::Result<T, crate::errors::ReboundError>;

        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub(super) enum Tier {
            Gold,
        }

        impl_domain_status_conversions!(Tier {
            Gold => "gold",
        });
    }

    #[test]
    fn test_expands_next_to_result_alias() {
        assert_eq!(aliased_result::Tier::from_str("GOLD").unwrap(), aliased_result::Tier::Gold);
    }

    #[test]
    fn test_display_uses_label() {
        assert_eq!(Lane::Fast.to_string(), "fast");
        assert_eq!(Lane::Slow.as_str(), "slow");
    }

    #[test]
    fn test_parse_ignores_case_and_whitespace() {
        assert_eq!(Lane::from_str("SLOW").unwrap(), Lane::Slow);
        assert_eq!(Lane::from_str(" Fast ").unwrap(), Lane::Fast);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        match Lane::from_str("medium") {
            Err(ReboundError::InvalidInput(msg)) => {
                assert!(msg.contains("Lane"));
                assert!(msg.contains("medium"));
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }
}
