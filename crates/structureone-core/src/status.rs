//! The fixed status table.
//!
//! Every recognized code maps to exactly one [`Category`] and one default
//! message. Codes outside the table are not guessed at; the formatter turns
//! them into [`ApiError::UnknownStatus`](crate::ApiError::UnknownStatus).

use serde::{Deserialize, Serialize};

/// Envelope category written to the `status` field of every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// 1xx and 2xx.
    Success,
    /// 3xx.
    Redirect,
    /// 4xx and 5xx.
    Error,
}

impl Category {
    /// Returns the wire name of the category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Redirect => "redirect",
            Self::Error => "error",
        }
    }

    const fn for_code(code: u16) -> Self {
        match code {
            300..=399 => Self::Redirect,
            400..=599 => Self::Error,
            _ => Self::Success,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the status table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInfo {
    /// HTTP status code.
    pub code: u16,
    /// Envelope category.
    pub category: Category,
    /// Message used when the caller supplies none.
    pub default_message: &'static str,
}

const TABLE: &[(u16, &str)] = &[
    (100, "Continue."),
    (101, "Switching protocols."),
    (102, "Processing."),
    (103, "Early hints."),
    (200, "Request was successful."),
    (201, "Resource created successfully."),
    (202, "Request accepted for processing."),
    (203, "Non-authoritative information."),
    (204, "No content."),
    (205, "Reset content."),
    (206, "Partial content."),
    (207, "Multi-status."),
    (208, "Already reported."),
    (226, "IM used."),
    (300, "Multiple choices available."),
    (301, "Resource moved permanently."),
    (302, "Resource found at another location."),
    (303, "See other resource."),
    (304, "Resource not modified."),
    (305, "Use proxy."),
    (307, "Temporary redirect."),
    (308, "Permanent redirect."),
    (400, "Bad request. Please check your input."),
    (401, "Unauthorized access. Please provide valid credentials."),
    (402, "Payment required."),
    (
        403,
        "Forbidden access. You do not have permission to access this resource.",
    ),
    (404, "The requested resource was not found."),
    (405, "Method not allowed for this resource."),
    (406, "Not acceptable."),
    (407, "Proxy authentication required."),
    (408, "Request timeout."),
    (409, "Conflict with the current state of the resource."),
    (410, "The requested resource is no longer available."),
    (411, "Length required."),
    (412, "Precondition failed."),
    (413, "Payload too large."),
    (414, "URI too long."),
    (415, "Unsupported media type."),
    (416, "Range not satisfiable."),
    (417, "Expectation failed."),
    (418, "I'm a teapot."),
    (421, "Misdirected request."),
    (
        422,
        "Unprocessable entity. The request was well-formed but was unable to be followed due to semantic errors.",
    ),
    (423, "Resource is locked."),
    (424, "Failed dependency."),
    (425, "Too early."),
    (426, "Upgrade required."),
    (428, "Precondition required."),
    (429, "Too many requests. Please slow down your request rate."),
    (431, "Request header fields too large."),
    (451, "Unavailable for legal reasons."),
    (500, "Internal server error. Please try again later."),
    (501, "Not implemented."),
    (502, "Bad gateway."),
    (
        503,
        "Service unavailable. The server is currently unable to handle the request due to temporary overload or maintenance.",
    ),
    (504, "Gateway timeout."),
    (505, "HTTP version not supported."),
    (506, "Variant also negotiates."),
    (507, "Insufficient storage."),
    (508, "Loop detected."),
    (510, "Not extended."),
    (511, "Network authentication required."),
];

/// Looks up a status code in the table.
#[must_use]
pub fn lookup(code: u16) -> Option<StatusInfo> {
    TABLE
        .binary_search_by_key(&code, |(c, _)| *c)
        .ok()
        .map(|idx| StatusInfo {
            code,
            category: Category::for_code(code),
            default_message: TABLE[idx].1,
        })
}
