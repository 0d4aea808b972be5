// Pre-submit validation for user input. Everything here runs before any
// network call; violations are collected and reported together so forms
// can mark every bad field at once.

use serde::Serialize;

use crate::category::CategoryStore;
use crate::error::{AppError, AppResult};
use crate::models::{NewListing, RegisterRequest};

pub const MAX_TITLE_CHARS: usize = 20;
pub const MIN_DESCRIPTION_CHARS: usize = 30;
pub const MAX_PHOTOS: usize = 10;
pub const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Checks a listing submission against the posting rules. The category
/// pair must exist in the current store and actually nest.
pub fn validate_new_listing(listing: &NewListing, store: &CategoryStore) -> AppResult<()> {
    let mut errors = Vec::new();

    match (listing.category_id, listing.sub_category_id) {
        (None, _) => errors.push(FieldError::new("categoryId", "Select a category")),
        (Some(_), None) => {
            errors.push(FieldError::new("subCategoryId", "Select a subcategory"))
        }
        (Some(category), Some(sub)) => match store.get(sub) {
            Some(record) if record.parent_id == Some(category) => {}
            Some(_) => errors.push(FieldError::new(
                "subCategoryId",
                "Subcategory does not belong to the selected category",
            )),
            None => errors.push(FieldError::new("subCategoryId", "Unknown subcategory")),
        },
    }

    if listing.photo_urls.is_empty() {
        errors.push(FieldError::new("photos", "Add at least one photo"));
    } else if listing.photo_urls.len() > MAX_PHOTOS {
        errors.push(FieldError::new(
            "photos",
            format!("At most {} photos are allowed", MAX_PHOTOS),
        ));
    }

    let title_len = listing.title.trim().chars().count();
    if title_len == 0 {
        errors.push(FieldError::new("title", "Enter a title"));
    } else if title_len > MAX_TITLE_CHARS {
        errors.push(FieldError::new(
            "title",
            format!("Title can be at most {} characters", MAX_TITLE_CHARS),
        ));
    }

    if listing.description.trim().chars().count() < MIN_DESCRIPTION_CHARS {
        errors.push(FieldError::new(
            "description",
            format!("Description must be at least {} characters", MIN_DESCRIPTION_CHARS),
        ));
    }

    if listing.address.trim().is_empty() {
        errors.push(FieldError::new("address", "Enter an address"));
    }

    match listing.price {
        None => errors.push(FieldError::new("price", "Enter a price")),
        Some(price) if price <= 0.0 => {
            errors.push(FieldError::new("price", "Price must be positive"))
        }
        Some(_) => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Registration form checks, mirroring what the mobile client enforced
/// before calling the backend.
pub fn validate_registration(request: &RegisterRequest) -> AppResult<()> {
    let mut errors = Vec::new();

    if request.full_name.trim().is_empty() {
        errors.push(FieldError::new("fullName", "Enter your name"));
    }

    if !looks_like_email(&request.email) {
        errors.push(FieldError::new("email", "Enter a valid email address"));
    }

    if request.password.chars().count() < MIN_PASSWORD_CHARS {
        errors.push(FieldError::new(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_CHARS),
        ));
    }

    let digits_only = request.phone_number.chars().all(|c| c.is_ascii_digit());
    let phone_len = request.phone_number.len();
    if !digits_only || !(10..=11).contains(&phone_len) {
        errors.push(FieldError::new(
            "phoneNumber",
            "Phone number must be 10-11 digits",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn looks_like_email(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryNode;

    fn store() -> CategoryStore {
        CategoryStore::from_tree(&[CategoryNode {
            id: Some(1),
            name: "Electronics".into(),
            sub_categories: Some(vec![CategoryNode {
                id: Some(11),
                name: "Phones".into(),
                sub_categories: None,
            }]),
        }])
    }

    fn valid_listing() -> NewListing {
        NewListing {
            category_id: Some(1),
            sub_category_id: Some(11),
            title: "iPhone 13 Pro".into(),
            description: "Boxed, no scratches, battery health at 95 percent.".into(),
            price: Some(25000.0),
            address: "Istanbul".into(),
            photo_urls: vec!["https://example.com/1.jpg".into()],
        }
    }

    fn fields_of(result: AppResult<()>) -> Vec<String> {
        match result {
            Err(AppError::Validation(errors)) => {
                errors.into_iter().map(|e| e.field).collect()
            }
            _ => Vec::new(),
        }
    }

    #[test]
    fn valid_listing_passes() {
        assert!(validate_new_listing(&valid_listing(), &store()).is_ok());
    }

    #[test]
    fn all_violations_are_collected_at_once() {
        let listing = NewListing {
            category_id: None,
            sub_category_id: None,
            title: String::new(),
            description: "too short".into(),
            price: None,
            address: "  ".into(),
            photo_urls: Vec::new(),
        };
        let fields = fields_of(validate_new_listing(&listing, &store()));
        assert_eq!(
            fields,
            vec!["categoryId", "photos", "title", "description", "address", "price"]
        );
    }

    #[test]
    fn overlong_title_and_photo_limit_are_rejected() {
        let mut listing = valid_listing();
        listing.title = "A very long title that goes past the limit".into();
        listing.photo_urls = (0..11).map(|i| format!("p{}.jpg", i)).collect();
        let fields = fields_of(validate_new_listing(&listing, &store()));
        assert_eq!(fields, vec!["photos", "title"]);
    }

    #[test]
    fn subcategory_must_nest_under_the_category() {
        let mut listing = valid_listing();
        listing.sub_category_id = Some(1); // a root, not a child of 1
        let fields = fields_of(validate_new_listing(&listing, &store()));
        assert_eq!(fields, vec!["subCategoryId"]);
    }

    #[test]
    fn registration_checks_each_field() {
        let request = RegisterRequest {
            full_name: " ".into(),
            email: "not-an-email".into(),
            phone_number: "12ab".into(),
            password: "123".into(),
        };
        let fields = fields_of(validate_registration(&request));
        assert_eq!(fields, vec!["fullName", "email", "password", "phoneNumber"]);

        let request = RegisterRequest {
            full_name: "Ada".into(),
            email: "ada@example.com".into(),
            phone_number: "05551234567".into(),
            password: "hunter22".into(),
        };
        assert!(validate_registration(&request).is_ok());
    }
}
