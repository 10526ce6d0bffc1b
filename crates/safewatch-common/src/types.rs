//! Common types for SafeWatch

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for users
pub type UserId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for contacts
pub type ContactId = Uuid;

/// Unique identifier for audience segments
pub type SegmentId = Uuid;

/// Unique identifier for surveys
pub type SurveyId = Uuid;

/// Unique identifier for survey questions
pub type QuestionId = Uuid;

/// Unique identifier for SMS alerts
pub type AlertId = Uuid;

/// Unique identifier for notifications
pub type NotificationId = Uuid;

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Upper bound on page size for list endpoints
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page selection for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
}

impl PageParams {
    /// Build page parameters, falling back to defaults and clamping
    /// out-of-range values.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = limit
            .filter(|l| *l >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        Self { page, limit }
    }

    /// Row offset: `(page - 1) * limit`
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination block returned with list responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_records: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(params: PageParams, total_records: i64) -> Self {
        let total_pages = if total_records <= 0 {
            0
        } else {
            (total_records + params.limit - 1) / params.limit
        };
        Self {
            current_page: params.page,
            total_pages,
            total_records: total_records.max(0),
            limit: params.limit,
        }
    }
}

/// Loose email shape check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Normalize a phone number to `+digits` / `digits`.
///
/// Spaces, dashes, dots and parentheses are dropped. Returns `None` unless the
/// result is an optional leading `+` followed by 7 to 15 digits.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let trimmed = phone.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return None,
        }
    }

    if !(7..=15).contains(&digits.len()) {
        return None;
    }

    Some(if plus { format!("+{}", digits) } else { digits })
}

/// Round to two decimal places (rates, costs, averages)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_page_params_defaults_and_clamping() {
        assert_eq!(PageParams::new(None, None), PageParams { page: 1, limit: 20 });
        assert_eq!(PageParams::new(Some(0), Some(0)), PageParams { page: 1, limit: 20 });
        assert_eq!(PageParams::new(Some(3), Some(500)).limit, MAX_PAGE_SIZE);
        assert_eq!(PageParams::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_pagination_block() {
        let params = PageParams::new(Some(2), Some(10));
        assert_eq!(
            Pagination::new(params, 25),
            Pagination {
                current_page: 2,
                total_pages: 3,
                total_records: 25,
                limit: 10,
            }
        );
        assert_eq!(Pagination::new(params, 0).total_pages, 0);
        assert_eq!(Pagination::new(params, 20).total_pages, 2);
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ops@city.gov"));
        assert!(is_valid_email(" ops@city.gov "));
        assert!(!is_valid_email("ops.city.gov"));
        assert!(!is_valid_email("@city.gov"));
        assert!(!is_valid_email("ops@city"));
        assert!(!is_valid_email("ops@@city.gov"));
        assert!(!is_valid_email("o ps@city.gov"));
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(normalize_phone("+1 (555) 010-2030"), Some("+15550102030".to_string()));
        assert_eq!(normalize_phone("0712 345 678"), Some("0712345678".to_string()));
        assert_eq!(normalize_phone("12345"), None);
        assert_eq!(normalize_phone("+1555abc0102"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(2.0 / 3.0 * 100.0), 66.67);
        assert_eq!(round2(3.0 * 0.05), 0.15);
        assert_eq!(round2(100.0), 100.0);
    }
}
