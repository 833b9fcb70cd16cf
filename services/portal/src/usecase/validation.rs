//! Field-level checks run before any form reaches the remote collaborators.
//!
//! Every failing field is reported, in form order.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;

use portal_domain::employee::{Cadre, Department, Division};

use crate::domain::types::{Metadata, ProfilePatch};
use crate::error::{PortalError, ValidationErrors};

const MIN_PASSWORD: usize = 6;

#[derive(Debug, Clone)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl SignInForm {
    pub fn validate(&self) -> Result<(), PortalError> {
        let mut errors = ValidationErrors::default();
        check_credentials(&mut errors, &self.email, &self.password);
        errors.into_result()
    }
}

/// Employee details shared by registration and profile editing.
#[derive(Debug, Clone)]
pub struct ProfileForm {
    pub full_name: String,
    pub cadre: Cadre,
    pub department: Department,
    pub division: Division,
    pub designation: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
    /// `YYYY-MM-DD`.
    pub date_of_joining: String,
    pub phone_number: String,
    pub address: String,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<(), PortalError> {
        let mut errors = ValidationErrors::default();
        self.check(&mut errors, None);
        errors.into_result()
    }

    /// Validate, then build the update payload carrying every editable field.
    pub fn to_patch(&self) -> Result<ProfilePatch, PortalError> {
        self.validate()?;
        Ok(ProfilePatch {
            full_name: Some(self.full_name.trim().to_owned()),
            cadre: Some(self.cadre),
            department: Some(self.department),
            division: Some(self.division),
            designation: Some(self.designation.trim().to_owned()),
            date_of_birth: parse_date(&self.date_of_birth),
            date_of_joining: parse_date(&self.date_of_joining),
            phone_number: Some(self.phone_number.trim().to_owned()),
            address: Some(self.address.trim().to_owned()),
            profile_image_url: None,
        })
    }

    fn check(&self, errors: &mut ValidationErrors, employee_id: Option<&str>) {
        if self.full_name.trim().chars().count() < 2 {
            errors.push("full_name", "Full name is required");
        }
        if employee_id.is_some_and(|id| id.trim().is_empty()) {
            errors.push("employee_id", "Employee ID is required");
        }
        if self.designation.trim().is_empty() {
            errors.push("designation", "Designation is required");
        }
        check_date(errors, "date_of_birth", &self.date_of_birth, "Date of birth is required");
        check_date(
            errors,
            "date_of_joining",
            &self.date_of_joining,
            "Date of joining is required",
        );
        if self.phone_number.trim().chars().count() < 10 {
            errors.push("phone_number", "Valid phone number is required");
        }
        if self.address.trim().chars().count() < 10 {
            errors.push("address", "Address is required");
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub employee_id: String,
    pub profile: ProfileForm,
}

impl SignUpForm {
    pub fn validate(&self) -> Result<(), PortalError> {
        let mut errors = ValidationErrors::default();
        check_credentials(&mut errors, &self.email, &self.password);
        if self.password != self.confirm_password {
            errors.push("confirm_password", "Passwords don't match");
        }
        self.profile.check(&mut errors, Some(&self.employee_id));
        errors.into_result()
    }

    /// Registration metadata stored with the identity; profile bootstrap reads it back.
    pub fn to_metadata(&self) -> Metadata {
        let p = &self.profile;
        let mut metadata = Metadata::new();
        let mut put = |key: &str, value: &str| {
            metadata.insert(key.to_owned(), Value::String(value.trim().to_owned()));
        };
        put("full_name", &p.full_name);
        put("employee_id", &self.employee_id);
        put("cadre", p.cadre.as_str());
        put("department", p.department.as_str());
        put("division", p.division.as_str());
        put("designation", &p.designation);
        put("date_of_birth", &p.date_of_birth);
        put("date_of_joining", &p.date_of_joining);
        put("phone_number", &p.phone_number);
        put("address", &p.address);
        metadata
    }
}

fn check_credentials(errors: &mut ValidationErrors, email: &str, password: &str) {
    if !is_valid_email(email) {
        errors.push("email", "Invalid email address");
    }
    if password.chars().count() < MIN_PASSWORD {
        errors.push("password", "Password must be at least 6 characters");
    }
}

fn check_date(errors: &mut ValidationErrors, field: &'static str, value: &str, required: &'static str) {
    if value.trim().is_empty() {
        errors.push(field, required);
    } else if parse_date(value).is_none() {
        errors.push(field, "Invalid date");
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z0-9_'+\-.]*[a-z0-9_+\-]@([a-z0-9][a-z0-9\-]*\.)+[a-z]{2,}$")
        .expect("email pattern compiles")
});

/// `local@domain.tld`; the local part may not start with a dot or hold `..`.
pub fn is_valid_email(email: &str) -> bool {
    !email.starts_with('.') && !email.contains("..") && EMAIL.is_match(email)
}
