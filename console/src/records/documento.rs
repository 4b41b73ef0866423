//! Remittance document records.
//!
//! [`Documento`] is the flat, view-ready shape of one receipt as the
//! console works with it: every scalar the wire sends tagged is reduced
//! to a plain string (numeric text stays text so display never reformats
//! it), plus the product lines extracted from the nested list.

use crate::utils::today_wire_date;
use crate::wire::{AttrValue, WireRecord};

/// One line item extracted by the document processor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Producto {
    pub descripcion: String,
    pub cantidad: f64,
    pub precio_unitario: Option<f64>,
    pub precio_bruto: String,
    pub precio_neto: String,
    pub precio_subtotal: String,
    pub codigo_de_articulo: String,
    pub importe: String,
}

/// A remittance receipt document, flattened from the wire format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Documento {
    pub sk: String,
    pub cliente: String,
    pub fecha_carga: String,
    pub fecha_comprobante: String,
    pub importe: String,
    pub numero_transaccion: String,
    pub banco: String,
    pub destinatario: String,
    pub tipo: String,
    pub enviado_por: String,
    pub estado: String,
    pub file_name: String,
    pub numero_factura: String,
    pub nombre_farmacia: String,
    pub total_factura: String,
    pub promedio_confianza: String,
    pub productos: Vec<Producto>,
}

impl Documento {
    /// Flattens one wire record into a document.
    ///
    /// Missing fields default to empty; a missing `cliente` falls back
    /// to `destinatario`, and a missing `fechaCarga` defaults to today.
    pub fn from_wire(record: &WireRecord) -> Self {
        let mut doc = Self {
            sk: owned(record.str_field("sk")),
            cliente: owned(record.str_field("cliente")),
            fecha_carga: owned(record.str_field("fechaCarga")),
            fecha_comprobante: owned(record.str_field("fechaComprobante")),
            importe: owned(record.num_field("importe")),
            numero_transaccion: owned(record.str_field("numeroTransaccion")),
            banco: owned(record.str_field("banco")),
            destinatario: owned(record.str_field("destinatario")),
            tipo: owned(record.str_field("tipo")),
            enviado_por: owned(record.str_field("enviadoPor")),
            estado: owned(record.str_field("estado")),
            file_name: owned(
                record
                    .str_field("fileName")
                    .or_else(|| record.str_field("filename")),
            ),
            numero_factura: owned(
                record
                    .str_field("numeroFactura")
                    .or_else(|| record.str_field("numerofactura")),
            ),
            nombre_farmacia: owned(record.str_field("nombreFarmacia")),
            total_factura: owned(record.num_field("totalFactura")),
            promedio_confianza: owned(record.num_field("promedio_confianza_textract")),
            productos: record
                .list_field("productos")
                .map(parse_productos)
                .unwrap_or_default(),
        };

        if doc.cliente.is_empty() && !doc.destinatario.is_empty() {
            doc.cliente = doc.destinatario.clone();
        }
        if doc.fecha_carga.is_empty() {
            doc.fecha_carga = today_wire_date();
        }

        doc
    }

    /// A document still being processed cannot be edited.
    pub fn is_editable(&self) -> bool {
        self.estado != "procesando"
    }
}

fn owned(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn parse_productos(items: &[AttrValue]) -> Vec<Producto> {
    items.iter().filter_map(producto_from_attr).collect()
}

fn producto_from_attr(attr: &AttrValue) -> Option<Producto> {
    let fields = attr.as_m()?;
    let text = |name: &str| {
        fields
            .get(name)
            .and_then(AttrValue::as_s)
            .unwrap_or_default()
            .to_string()
    };
    // Price columns keep their original text, numeric or not.
    let numeric_text = |name: &str| {
        fields
            .get(name)
            .and_then(|v| v.as_n().or_else(|| v.as_s()))
            .unwrap_or_default()
            .to_string()
    };

    Some(Producto {
        descripcion: text("descripcion"),
        cantidad: fields
            .get("cantidad")
            .and_then(AttrValue::as_n)
            .and_then(|n| n.parse().ok())
            .unwrap_or(0.0),
        precio_unitario: fields.get("precio_unitario").and_then(AttrValue::as_f64),
        precio_bruto: numeric_text("precio_bruto"),
        precio_neto: numeric_text("precio_neto"),
        precio_subtotal: numeric_text("precio_subtotal"),
        codigo_de_articulo: text("codigo_de_articulo"),
        importe: fields
            .get("importe")
            .and_then(AttrValue::as_s)
            .unwrap_or("0")
            .to_string(),
    })
}
