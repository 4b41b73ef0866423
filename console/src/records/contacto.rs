//! Agenda contact records.
//!
//! The agenda endpoint returns a flat list of parent and child rows
//! keyed by composite sort keys: `cliente#<id>` for the contact itself,
//! `cliente#<id>#mail#<n>` and `cliente#<id>#numero#<n>` for its
//! addresses. [`group_contactos`] folds that list into one record per
//! contact in two passes, parents first.
//!
//! Agenda rows arrive in a mix of shapes: some fields carry the tagged
//! `{"S": "..."}` wrapper, some are plain strings. Extraction accepts
//! both.

use serde_json::Value;
use std::collections::HashMap;

/// A child entry (mail or phone) keyed by its own sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactoItem {
    /// Full sort key of the child row, used to edit or delete it.
    pub sk: String,
    pub value: String,
}

/// One agenda contact with its grouped addresses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contacto {
    /// Identifier segment of the sort key (`cliente#<id>`).
    pub id: String,
    pub sk: String,
    pub cliente: String,
    pub mails: Vec<ContactoItem>,
    pub celulares: Vec<ContactoItem>,
}

/// Reads a string field that may be tagged (`{"S": "x"}`) or plain.
fn field_str<'a>(item: &'a Value, name: &str) -> Option<&'a str> {
    match item.get(name)? {
        Value::Object(tagged) => tagged.get("S").and_then(Value::as_str),
        Value::String(plain) => Some(plain),
        _ => None,
    }
}

/// Groups the flat row list into contacts.
///
/// Pass one collects the parent rows (`pkgsi1 == "cliente"`); pass two
/// attaches mails and phones to their parents by sort-key prefix. Rows
/// without a sort key, and children whose parent is not in the list,
/// are dropped. Output preserves the parents' arrival order.
pub fn group_contactos(items: &[Value]) -> Vec<Contacto> {
    let mut contactos: Vec<Contacto> = Vec::new();
    let mut by_sk: HashMap<&str, usize> = HashMap::new();

    for item in items {
        let Some(sk) = field_str(item, "sk") else {
            continue;
        };
        if field_str(item, "pkgsi1") != Some("cliente") {
            continue;
        }

        let cliente = match field_str(item, "skgsi1") {
            Some(nombre) if !nombre.is_empty() => nombre.to_string(),
            _ => "Cliente sin nombre".to_string(),
        };
        by_sk.insert(sk, contactos.len());
        contactos.push(Contacto {
            id: sk.split('#').nth(1).unwrap_or_default().to_string(),
            sk: sk.to_string(),
            cliente,
            mails: Vec::new(),
            celulares: Vec::new(),
        });
    }

    for item in items {
        let Some(sk) = field_str(item, "sk") else {
            continue;
        };
        let value = field_str(item, "skgsi1").unwrap_or_default().to_string();
        let entry = ContactoItem {
            sk: sk.to_string(),
            value,
        };

        match field_str(item, "pkgsi1") {
            Some("mail") => {
                let parent = sk.split_once("#mail#").map_or(sk, |(head, _)| head);
                if let Some(&i) = by_sk.get(parent) {
                    contactos[i].mails.push(entry);
                }
            }
            Some("numero") => {
                let parent = sk.split_once("#numero#").map_or(sk, |(head, _)| head);
                if let Some(&i) = by_sk.get(parent) {
                    contactos[i].celulares.push(entry);
                }
            }
            _ => {}
        }
    }

    contactos
}
