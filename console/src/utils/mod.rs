//! Collection of general utility functions shared across the console.
//!
//! Date and amount formatting helpers, the phone-number rules applied to
//! agenda contacts, composite record identifiers, and client-side pagination
//! for list views.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

static PHONE_RULE: OnceLock<Regex> = OnceLock::new();
static NON_PHONE_CHARS: OnceLock<Regex> = OnceLock::new();
static IMPORTE_SEPARATORS: OnceLock<Regex> = OnceLock::new();

fn phone_rule() -> &'static Regex {
    PHONE_RULE.get_or_init(|| Regex::new(r"^\+[0-9]+$").expect("phone rule regex"))
}

fn non_phone_chars() -> &'static Regex {
    NON_PHONE_CHARS.get_or_init(|| Regex::new(r"[^0-9+]").expect("phone cleanup regex"))
}

fn importe_separators() -> &'static Regex {
    IMPORTE_SEPARATORS.get_or_init(|| Regex::new(r"[.,\s]").expect("importe separator regex"))
}

/// Renders a wire date for display: `YYYY-MM-DD` becomes `dd/MM/yyyy`, ISO
/// datetimes become `dd/MM/yyyy HH:mm`. Unparseable strings are returned
/// unchanged.
pub fn format_date(fecha: &str) -> String {
    if fecha.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(fecha) {
            return dt.format("%d/%m/%Y %H:%M").to_string();
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(fecha, "%Y-%m-%dT%H:%M:%S") {
            return dt.format("%d/%m/%Y %H:%M").to_string();
        }
        return fecha.to_string();
    }

    match NaiveDate::parse_from_str(fecha, "%Y-%m-%d") {
        Ok(d) => d.format("%d/%m/%Y").to_string(),
        Err(_) => fecha.to_string(),
    }
}

/// Today's date in the wire form the API uses (`YYYY-MM-DD`).
pub fn today_wire_date() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Strips the separators tolerated in amounts (dots, commas, whitespace) so
/// two amounts can be compared as digit strings.
pub fn normalize_importe(importe: &str) -> String {
    importe_separators().replace_all(importe, "").to_string()
}

/// Cleans a phone number for storage: keeps digits and `+`, then guarantees
/// the leading `+`.
pub fn format_phone(raw: &str) -> String {
    let cleaned = non_phone_chars().replace_all(raw, "").to_string();
    if cleaned.starts_with('+') {
        cleaned
    } else {
        format!("+{}", cleaned)
    }
}

/// A storable phone number is `+` followed by digits only.
pub fn is_valid_phone(numero: &str) -> bool {
    phone_rule().is_match(numero)
}

/// Sort key for a new parent contact record.
pub fn cliente_sk() -> String {
    format!("cliente#{}", Uuid::now_v7().simple())
}

/// Sort key for an email record hanging off `parent_sk`.
pub fn mail_sk(parent_sk: &str) -> String {
    format!("{}#mail#{}", parent_sk, Uuid::now_v7().simple())
}

/// Sort key for a phone record hanging off `parent_sk`.
pub fn numero_sk(parent_sk: &str) -> String {
    format!("{}#numero#{}", parent_sk, Uuid::now_v7().simple())
}

/// Pagination metadata for list views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    /// Current page number (1-indexed)
    pub current_page: u32,
    /// Number of items per page
    pub per_page: u32,
    /// Total number of items across all pages
    pub total_items: u64,
    /// Total number of pages
    pub total_pages: u32,
    /// Whether there is a next page
    pub has_next: bool,
    /// Whether there is a previous page
    pub has_prev: bool,
}

impl PaginationMeta {
    /// Create pagination metadata from page parameters and total count
    pub fn new(current_page: u32, per_page: u32, total_items: u64) -> Self {
        let total_pages = if total_items == 0 {
            1
        } else {
            ((total_items - 1) / per_page as u64 + 1) as u32
        };

        let has_next = current_page < total_pages;
        let has_prev = current_page > 1;

        Self {
            current_page,
            per_page,
            total_items,
            total_pages,
            has_next,
            has_prev,
        }
    }
}

/// Pagination parameters for list views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationFilter {
    /// Page number (1-indexed)
    pub page: Option<u32>,
    /// Number of items per page
    pub per_page: Option<u32>,
}

impl PaginationFilter {
    /// Get page number with default
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    /// Get per_page with default
    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(10)
    }

    /// Calculate offset into the full collection
    pub fn offset(&self) -> usize {
        ((self.page() - 1) * self.per_page()) as usize
    }

    pub fn limit(&self) -> usize {
        self.per_page() as usize
    }

    /// Clamps the requested page into the valid range for `total_items`.
    pub fn clamped(&self, total_items: u64) -> Self {
        let meta = PaginationMeta::new(self.page(), self.per_page(), total_items);
        Self {
            page: Some(self.page().min(meta.total_pages)),
            per_page: Some(self.per_page()),
        }
    }
}

impl Default for PaginationFilter {
    fn default() -> Self {
        Self {
            page: Some(1),
            per_page: Some(10),
        }
    }
}

/// Apply pagination to a collection
pub fn apply_pagination<T>(items: Vec<T>, pagination: &PaginationFilter) -> Vec<T> {
    let offset = pagination.offset();
    let limit = pagination.limit();

    items.into_iter().skip(offset).take(limit).collect()
}
