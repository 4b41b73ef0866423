//! Spreadsheet exports.
//!
//! Both exports write the currently filtered rows, named with today's
//! date. Contacts flatten to one row per mail/phone combination so the
//! sheet is usable for mail-merge style followups.

use crate::errors::{ApiError, ApiResult};
use crate::records::{Contacto, ContactoItem, Documento};
use crate::utils::today_wire_date;
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use tracing::info;

const DOCUMENTOS_HEADERS: [&str; 9] = [
    "CLIENTE",
    "FECHA DE CARGA",
    "FECHA DE COMPROBANTE",
    "IMPORTE",
    "NUMERO DE TRANSACCION",
    "BANCO",
    "DESTINATARIO",
    "TRF / DEPOSITO",
    "ENVIADO POR",
];

const CONTACTOS_HEADERS: [&str; 3] = ["CLIENTE", "EMAIL", "CELULAR"];

/// Writes `documentos_<fecha>.xlsx` into `out_dir` and returns its path.
pub fn export_documentos(documentos: &[Documento], out_dir: &Path) -> ApiResult<PathBuf> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Documentos")?;

    for (col, header) in DOCUMENTOS_HEADERS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }

    for (i, doc) in documentos.iter().enumerate() {
        let row = (i + 1) as u32;
        let cliente = if doc.cliente.is_empty() {
            &doc.destinatario
        } else {
            &doc.cliente
        };
        let cells: [&str; 9] = [
            cliente.as_str(),
            &doc.fecha_carga,
            &doc.fecha_comprobante,
            &doc.importe,
            &doc.numero_transaccion,
            &doc.banco,
            &doc.destinatario,
            &doc.tipo,
            &doc.enviado_por,
        ];
        for (col, cell) in cells.iter().enumerate() {
            worksheet.write_string(row, col as u16, *cell)?;
        }
    }

    let path = out_dir.join(format!("documentos_{}.xlsx", today_wire_date()));
    save(workbook, &path)?;
    info!("exported {} documents to {}", documentos.len(), path.display());
    Ok(path)
}

/// Writes `agenda_contactos_<fecha>.xlsx` into `out_dir` and returns
/// its path.
pub fn export_contactos(contactos: &[Contacto], out_dir: &Path) -> ApiResult<PathBuf> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Contactos")?;

    for (col, header) in CONTACTOS_HEADERS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }

    let mut row: u32 = 1;
    for contacto in contactos {
        for (mail, celular) in flatten_contacto(contacto) {
            worksheet.write_string(row, 0, &contacto.cliente)?;
            worksheet.write_string(row, 1, &mail)?;
            worksheet.write_string(row, 2, &celular)?;
            row += 1;
        }
    }

    let path = out_dir.join(format!("agenda_contactos_{}.xlsx", today_wire_date()));
    save(workbook, &path)?;
    info!("exported {} contacts to {}", contactos.len(), path.display());
    Ok(path)
}

/// One (mail, phone) pair per combination; a contact without either
/// still produces a single blank row.
fn flatten_contacto(contacto: &Contacto) -> Vec<(String, String)> {
    if contacto.mails.is_empty() && contacto.celulares.is_empty() {
        return vec![(String::new(), String::new())];
    }

    let placeholder = [ContactoItem {
        sk: String::new(),
        value: String::new(),
    }];
    let mails: &[ContactoItem] = if contacto.mails.is_empty() {
        &placeholder
    } else {
        &contacto.mails
    };
    let celulares: &[ContactoItem] = if contacto.celulares.is_empty() {
        &placeholder
    } else {
        &contacto.celulares
    };

    let mut pares = Vec::with_capacity(mails.len() * celulares.len());
    for mail in mails {
        for celular in celulares {
            pares.push((mail.value.clone(), celular.value.clone()));
        }
    }
    pares
}

fn save(mut workbook: Workbook, path: &Path) -> ApiResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ApiError::file(format!("{}: {e}", parent.display())))?;
    }
    workbook.save(path)?;
    Ok(())
}
