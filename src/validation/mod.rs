//! Input validation module

use crate::models::{CreatePenduduk, CreateStaffUser, UpdatePenduduk};
use chrono::NaiveDate;
use thiserror::Error;
use validator::Validate;

const NIK_LENGTH: usize = 16;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("NIK must be exactly 16 digits")]
    InvalidNik,

    #[error("Field '{field}' must be 1 to 3 digits")]
    InvalidRtRw { field: String },

    #[error("Date of birth cannot be in the future")]
    FutureBirthDate,

    #[error("Invalid username (letters, digits, '.', '_' or '-' only)")]
    InvalidUsername,

    #[error("{0}")]
    Fields(#[from] validator::ValidationErrors),
}

/// Validate a new resident record against `today`
pub fn validate_create_penduduk(
    input: &CreatePenduduk,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    input.validate()?;

    validate_nik(&input.nik)?;
    require_text("nama", &input.nama)?;
    require_text("tempat_lahir", &input.tempat_lahir)?;
    require_text("alamat", &input.alamat)?;
    validate_rt_rw("rt", &input.rt)?;
    validate_rt_rw("rw", &input.rw)?;

    if input.tanggal_lahir > today {
        return Err(ValidationError::FutureBirthDate);
    }

    Ok(())
}

/// Validate a partial resident update; absent fields are left alone
pub fn validate_update_penduduk(
    input: &UpdatePenduduk,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    input.validate()?;

    if let Some(ref nama) = input.nama {
        require_text("nama", nama)?;
    }
    if let Some(ref tempat_lahir) = input.tempat_lahir {
        require_text("tempat_lahir", tempat_lahir)?;
    }
    if let Some(ref alamat) = input.alamat {
        require_text("alamat", alamat)?;
    }
    if let Some(ref rt) = input.rt {
        validate_rt_rw("rt", rt)?;
    }
    if let Some(ref rw) = input.rw {
        validate_rt_rw("rw", rw)?;
    }
    if matches!(input.tanggal_lahir, Some(date) if date > today) {
        return Err(ValidationError::FutureBirthDate);
    }

    Ok(())
}

/// Validate a new staff account
pub fn validate_create_staff(input: &CreateStaffUser) -> Result<(), ValidationError> {
    input.validate()?;

    let username_ok = input
        .username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !username_ok {
        return Err(ValidationError::InvalidUsername);
    }

    require_text("nama", &input.nama)
}

/// NIK (Nomor Induk Kependudukan): 16 ASCII digits
pub fn validate_nik(nik: &str) -> Result<(), ValidationError> {
    if nik.len() != NIK_LENGTH || !nik.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidNik);
    }
    Ok(())
}

fn validate_rt_rw(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.len() > 3 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidRtRw {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}
