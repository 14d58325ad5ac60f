// SPDX-License-Identifier: CEPL-1.0
use std::io;
use thiserror::Error;

/// Everything that can end a render session.
///
/// None of these are recovered locally; they travel up to the entry point
/// and end the process through [`crate::report`].
#[derive(Debug, Error)]
pub enum Failure {
    /// A required extension, layer, format, present mode or queue family is absent.
    #[error("missing capability: {what}")]
    MissingCapability { what: String },

    /// A graphics API call returned something other than success.
    #[error("{call} failed: {result}")]
    Status {
        call: &'static str,
        result: String,
        code: i32,
    },

    /// An OS call (window, event loop, handles) failed.
    #[error("{context}: {source}")]
    Platform {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl Failure {
    pub fn missing(what: impl Into<String>) -> Self {
        Failure::MissingCapability { what: what.into() }
    }

    /// An OS error carrying a raw code keeps it as the exit status.
    pub fn platform(context: impl Into<String>, source: io::Error) -> Self {
        Failure::Platform {
            context: context.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Failure::MissingCapability { .. } => 1,
            Failure::Status { code, .. } => nonzero_or_one(*code),
            Failure::Platform { source, .. } => {
                source.raw_os_error().map(nonzero_or_one).unwrap_or(1)
            }
        }
    }
}

fn nonzero_or_one(code: i32) -> i32 {
    if code == 0 {
        1
    } else {
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_capability_exits_with_one() {
        let f = Failure::missing("VK_KHR_swapchain");
        assert_eq!(f.exit_code(), 1);
        assert_eq!(f.to_string(), "missing capability: VK_KHR_swapchain");
    }

    #[test]
    fn status_failure_exits_with_result_code() {
        let f = Failure::Status {
            call: "vkCreateDevice",
            result: "ERROR_INITIALIZATION_FAILED".into(),
            code: -3,
        };
        assert_eq!(f.exit_code(), -3);
        assert!(f.to_string().starts_with("vkCreateDevice failed"));
    }

    #[test]
    fn zero_codes_never_report_success() {
        let status = Failure::Status {
            call: "vkGetSwapchainImagesKHR",
            result: "image count mismatch".into(),
            code: 0,
        };
        assert_eq!(status.exit_code(), 1);

        let platform = Failure::Platform {
            context: "create window".into(),
            source: io::Error::from_raw_os_error(0),
        };
        assert_eq!(platform.exit_code(), 1);
    }

    #[test]
    fn platform_failure_exits_with_os_code() {
        let f = Failure::platform("create window", io::Error::from_raw_os_error(5));
        assert_eq!(f.exit_code(), 5);
        assert!(f.to_string().starts_with("create window: "));
    }
}
