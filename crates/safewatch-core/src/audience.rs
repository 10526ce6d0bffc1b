//! Contact validation and bulk import preparation

use safewatch_common::types::{is_valid_email, normalize_phone, ContactId};
use safewatch_common::{Error, Result};
use safewatch_storage::models::{ContactStatus, CreateContact, UpdateContact};
use safewatch_storage::repository::{ImportRow, ImportSkip};
use serde::Deserialize;
use serde_json::Value;

/// Contact fields as they arrive in a request body or import row
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub age_group: Option<String>,
    pub language: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_email(email: Option<String>) -> Result<Option<String>> {
    match non_blank(email) {
        Some(email) if !is_valid_email(&email) => {
            Err(Error::validation(format!("Invalid email address: {}", email)))
        }
        other => Ok(other.map(|e| e.to_lowercase())),
    }
}

fn check_phone(phone: Option<String>) -> Result<Option<String>> {
    match non_blank(phone) {
        Some(phone) => normalize_phone(&phone)
            .map(Some)
            .ok_or_else(|| Error::validation(format!("Invalid phone number: {}", phone))),
        None => Ok(None),
    }
}

fn check_status(status: Option<String>) -> Result<Option<ContactStatus>> {
    non_blank(status)
        .map(|s| s.parse::<ContactStatus>().map_err(Error::validation))
        .transpose()
}

/// Validate a new contact: names required, at least one of email or phone
pub fn validate_contact(input: ContactInput) -> Result<CreateContact> {
    let first_name = non_blank(input.first_name)
        .ok_or_else(|| Error::validation("First name is required"))?;
    let last_name =
        non_blank(input.last_name).ok_or_else(|| Error::validation("Last name is required"))?;

    let email = check_email(input.email)?;
    let phone = check_phone(input.phone)?;
    if email.is_none() && phone.is_none() {
        return Err(Error::validation("Either email or phone is required"));
    }

    Ok(CreateContact {
        first_name,
        last_name,
        email,
        phone,
        region: non_blank(input.region),
        city: non_blank(input.city),
        age_group: non_blank(input.age_group),
        language: non_blank(input.language),
        tags: input.tags,
        status: check_status(input.status)?,
    })
}

/// Validate a partial contact update. Names may not be blanked.
pub fn validate_contact_update(input: ContactInput) -> Result<UpdateContact> {
    let name = |value: Option<String>, field: &str| match value {
        Some(v) if v.trim().is_empty() => Err(Error::validation(format!("{} cannot be empty", field))),
        other => Ok(other.map(|v| v.trim().to_string())),
    };

    Ok(UpdateContact {
        first_name: name(input.first_name, "First name")?,
        last_name: name(input.last_name, "Last name")?,
        email: check_email(input.email)?,
        phone: check_phone(input.phone)?,
        region: input.region,
        city: input.city,
        age_group: input.age_group,
        language: input.language,
        tags: input.tags,
        status: check_status(input.status)?,
    })
}

/// Validate every import row. Rows are numbered from 1.
///
/// Rows that fail validation become skips; duplicate emails are left to the
/// repository, which also checks the stored contacts.
pub fn prepare_import(rows: Vec<Value>) -> (Vec<ImportRow>, Vec<ImportSkip>) {
    let mut valid = Vec::with_capacity(rows.len());
    let mut skipped = Vec::new();

    for (index, raw) in rows.into_iter().enumerate() {
        let row = index + 1;
        let parsed = serde_json::from_value::<ContactInput>(raw)
            .map_err(|_| Error::validation("Row is not a contact object"))
            .and_then(validate_contact);

        match parsed {
            Ok(contact) => valid.push(ImportRow { row, contact }),
            Err(e) => skipped.push(ImportSkip {
                row,
                reason: e.to_string(),
            }),
        }
    }

    (valid, skipped)
}

/// A segment membership request must name at least one contact
pub fn check_membership_ids(contact_ids: &[ContactId]) -> Result<()> {
    if contact_ids.is_empty() {
        return Err(Error::validation("contact_ids must not be empty"));
    }
    Ok(())
}

/// Fail when any requested contact does not exist
pub fn check_missing_contacts(missing: &[ContactId]) -> Result<()> {
    if missing.is_empty() {
        return Ok(());
    }
    let ids: Vec<String> = missing.iter().map(ToString::to_string).collect();
    Err(Error::not_found(format!("Contacts not found: {}", ids.join(", "))))
}

/// Existing members are skipped; adding nobody at all is a conflict
pub fn check_members_added(added: u64) -> Result<u64> {
    if added == 0 {
        return Err(Error::conflict("All contacts are already in segment"));
    }
    Ok(added)
}

/// Merge validation skips with the repository's duplicate-email skips, in row order
pub fn merge_import_skips(mut invalid: Vec<ImportSkip>, duplicates: Vec<ImportSkip>) -> Vec<ImportSkip> {
    invalid.extend(duplicates);
    invalid.sort_by_key(|skip| skip.row);
    invalid
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn input(email: Option<&str>, phone: Option<&str>) -> ContactInput {
        ContactInput {
            first_name: Some("Ada".into()),
            last_name: Some("Okafor".into()),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_contact_needs_email_or_phone() {
        let err = validate_contact(input(None, Some("  "))).unwrap_err();
        assert_eq!(err.to_string(), "Either email or phone is required");

        assert!(validate_contact(input(Some("ada@city.gov"), None)).is_ok());
        assert!(validate_contact(input(None, Some("+1 555 010 2030"))).is_ok());
    }

    #[test]
    fn test_contact_fields_are_normalized() {
        let contact = validate_contact(input(Some(" Ada@City.gov "), Some("(555) 010-2030"))).unwrap();
        assert_eq!(contact.email.as_deref(), Some("ada@city.gov"));
        assert_eq!(contact.phone.as_deref(), Some("5550102030"));
        assert_eq!(contact.status, None);
    }

    #[test]
    fn test_contact_rejects_bad_values() {
        assert!(validate_contact(input(Some("not-an-email"), None)).is_err());
        assert!(validate_contact(input(None, Some("12ab"))).is_err());

        let mut bad_status = input(Some("ada@city.gov"), None);
        bad_status.status = Some("gone".into());
        let err = validate_contact(bad_status).unwrap_err();
        assert_eq!(err.to_string(), "Invalid contact status: gone");

        let mut nameless = input(Some("ada@city.gov"), None);
        nameless.first_name = None;
        assert_eq!(
            validate_contact(nameless).unwrap_err().to_string(),
            "First name is required"
        );
    }

    #[test]
    fn test_update_keeps_names_non_blank() {
        let update = ContactInput {
            last_name: Some(" ".into()),
            ..Default::default()
        };
        assert!(validate_contact_update(update).is_err());

        let update = ContactInput {
            phone: Some("+44 20 7946 0018".into()),
            ..Default::default()
        };
        let changes = validate_contact_update(update).unwrap();
        assert_eq!(changes.phone.as_deref(), Some("+442079460018"));
        assert_eq!(changes.first_name, None);
    }

    #[test]
    fn test_prepare_import_splits_rows() {
        let (valid, skipped) = prepare_import(vec![
            json!({"first_name": "Ada", "last_name": "Okafor", "phone": "+15550102030"}),
            json!({"first_name": "Ben", "last_name": "Li"}),
            json!("just a string"),
            json!({"first_name": "Cy", "last_name": "Ng", "email": "cy@city.gov"}),
        ]);

        assert_eq!(valid.iter().map(|r| r.row).collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(
            skipped,
            vec![
                ImportSkip {
                    row: 2,
                    reason: "Either email or phone is required".into()
                },
                ImportSkip {
                    row: 3,
                    reason: "Row is not a contact object".into()
                },
            ]
        );
    }

    #[test]
    fn test_segment_membership_rules() {
        assert_eq!(
            check_membership_ids(&[]).unwrap_err().to_string(),
            "contact_ids must not be empty"
        );
        assert!(check_membership_ids(&[uuid::Uuid::new_v4()]).is_ok());

        assert!(check_missing_contacts(&[]).is_ok());
        let missing = uuid::Uuid::new_v4();
        let err = check_missing_contacts(&[missing]).unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), format!("Contacts not found: {}", missing));

        let err = check_members_added(0).unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(err.to_string(), "All contacts are already in segment");
        assert_eq!(check_members_added(2).unwrap(), 2);
    }

    #[test]
    fn test_import_skips_are_reported_in_row_order() {
        let skip = |row: usize, reason: &str| ImportSkip {
            row,
            reason: reason.to_string(),
        };

        let merged = merge_import_skips(
            vec![skip(2, "Either email or phone is required"), skip(5, "Row is not a contact object")],
            vec![skip(1, "Duplicate email: ada@city.gov"), skip(4, "Duplicate email: ben@city.gov")],
        );
        assert_eq!(
            merged.iter().map(|s| s.row).collect::<Vec<_>>(),
            vec![1, 2, 4, 5]
        );
        assert_eq!(merged[0].reason, "Duplicate email: ada@city.gov");
    }
}
