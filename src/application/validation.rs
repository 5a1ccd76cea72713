//! Client-side checks run before anything is sent to the API.

use catalog_api_types::{CreateProductRequest, UpdateProductRequest};
use url::Url;

use crate::domain::error::{DomainError, FieldErrors};

const MIN_NAME_CHARS: usize = 3;
const MIN_DESCRIPTION_CHARS: usize = 10;

/// `local@domain.tld` with no whitespace and a single `@`.
pub fn validate_email(email: &str) -> Result<(), DomainError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(DomainError::validation("email", "Email is required"));
    }
    if !is_email_shaped(email) {
        return Err(DomainError::validation(
            "email",
            "Please enter a valid email address",
        ));
    }
    Ok(())
}

fn is_email_shaped(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Product form as entered by the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category_id: String,
    pub images: Vec<String>,
}

impl ProductForm {
    /// Validate every field, collecting all failures.
    pub fn validate(&self) -> Result<CreateProductRequest, DomainError> {
        let mut errors = FieldErrors::new();
        check_name(&self.name, &mut errors);
        check_description(&self.description, &mut errors);
        check_price(self.price, &mut errors);
        if self.category_id.trim().is_empty() {
            errors.insert("categoryId", "Please select a category");
        }
        check_images(&self.images, &mut errors);
        errors.into_result()?;

        Ok(CreateProductRequest {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            images: non_empty_images(&self.images),
            price: self.price,
            category_id: self.category_id.clone(),
        })
    }
}

/// Validate only the fields an update sends.
pub fn validate_update(request: &UpdateProductRequest) -> Result<(), DomainError> {
    let mut errors = FieldErrors::new();
    if request.is_empty() {
        errors.insert("request", "Nothing to update");
    }
    if let Some(name) = &request.name {
        check_name(name, &mut errors);
    }
    if let Some(description) = &request.description {
        check_description(description, &mut errors);
    }
    if let Some(price) = request.price {
        check_price(price, &mut errors);
    }
    if let Some(category_id) = &request.category_id
        && category_id.trim().is_empty()
    {
        errors.insert("categoryId", "Please select a category");
    }
    if let Some(images) = &request.images {
        check_images(images, &mut errors);
    }
    errors.into_result()
}

fn check_name(name: &str, errors: &mut FieldErrors) {
    if name.trim().is_empty() {
        errors.insert("name", "Product name is required");
    } else if name.chars().count() < MIN_NAME_CHARS {
        errors.insert("name", "Product name must be at least 3 characters");
    }
}

fn check_description(description: &str, errors: &mut FieldErrors) {
    if description.trim().is_empty() {
        errors.insert("description", "Description is required");
    } else if description.chars().count() < MIN_DESCRIPTION_CHARS {
        errors.insert(
            "description",
            "Description must be at least 10 characters",
        );
    }
}

fn check_price(price: f64, errors: &mut FieldErrors) {
    if !price.is_finite() || price <= 0.0 {
        errors.insert("price", "Price must be greater than 0");
    }
}

fn check_images(images: &[String], errors: &mut FieldErrors) {
    if images.first().is_none_or(|first| first.trim().is_empty()) {
        errors.insert("images", "At least one image URL is required");
        return;
    }
    for (index, image) in images.iter().enumerate() {
        if !image.is_empty() && Url::parse(image).is_err() {
            errors.insert(format!("image_{index}"), "Please enter a valid URL");
        }
    }
}

fn non_empty_images(images: &[String]) -> Vec<String> {
    images
        .iter()
        .filter(|image| !image.trim().is_empty())
        .cloned()
        .collect()
}
