//! Documents workflow: listing with filters and pagination, detail view,
//! edit, delete, upload, spreadsheet export, and watch mode.

use crate::auth::{GuardState, SessionGuard};
use crate::errors::{ApiError, ApiResult};
use crate::records::Documento;
use crate::services::export::export_documentos;
use crate::services::{DocumentosService, UploadService};
use crate::utils::{
    PaginationFilter, PaginationMeta, apply_pagination, format_date, normalize_importe,
};
use crate::views::{confirmar, render_table};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

const DOCUMENTOS_COLUMNS: [&str; 10] = [
    "SK",
    "CLIENTE",
    "FECHA DE CARGA",
    "FECHA DE COMPROBANTE",
    "IMPORTE",
    "BANCO",
    "DESTINATARIO",
    "TRF / DEPOSITO",
    "ENVIADO POR",
    "ESTADO",
];

/// Filters and output switches for the list command.
#[derive(Debug, Clone, Default)]
pub struct ListarOpciones {
    pub desde: Option<String>,
    pub hasta: Option<String>,
    pub enviado_por: Option<String>,
    pub importe: Option<String>,
    pub destinatario: Option<String>,
    pub page: Option<u32>,
    pub export: bool,
}

/// Field edits for one document. Absent fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct CambiosDocumento {
    pub cliente: Option<String>,
    pub fecha_carga: Option<String>,
    pub fecha_comprobante: Option<String>,
    pub importe: Option<String>,
    pub numero_transaccion: Option<String>,
    pub banco: Option<String>,
    pub destinatario: Option<String>,
    pub tipo: Option<String>,
    pub enviado_por: Option<String>,
}

impl CambiosDocumento {
    pub fn is_empty(&self) -> bool {
        self.cliente.is_none()
            && self.fecha_carga.is_none()
            && self.fecha_comprobante.is_none()
            && self.importe.is_none()
            && self.numero_transaccion.is_none()
            && self.banco.is_none()
            && self.destinatario.is_none()
            && self.tipo.is_none()
            && self.enviado_por.is_none()
    }

    fn apply(&self, documento: &mut Documento) {
        if let Some(v) = &self.cliente {
            documento.cliente = v.clone();
        }
        if let Some(v) = &self.fecha_carga {
            documento.fecha_carga = v.clone();
        }
        if let Some(v) = &self.fecha_comprobante {
            documento.fecha_comprobante = v.clone();
        }
        if let Some(v) = &self.importe {
            documento.importe = v.clone();
        }
        if let Some(v) = &self.numero_transaccion {
            documento.numero_transaccion = v.clone();
        }
        if let Some(v) = &self.banco {
            documento.banco = v.clone();
        }
        if let Some(v) = &self.destinatario {
            documento.destinatario = v.clone();
        }
        if let Some(v) = &self.tipo {
            documento.tipo = v.clone();
        }
        if let Some(v) = &self.enviado_por {
            documento.enviado_por = v.clone();
        }
    }
}

pub struct DocumentosView {
    service: DocumentosService,
    upload: UploadService,
    export_dir: PathBuf,
    watch_interval: Duration,
}

impl DocumentosView {
    pub fn new(
        service: DocumentosService,
        upload: UploadService,
        export_dir: impl Into<PathBuf>,
        watch_interval: Duration,
    ) -> Self {
        Self {
            service,
            upload,
            export_dir: export_dir.into(),
            watch_interval,
        }
    }

    /// Lists documents as a table, or exports the filtered set when
    /// `--export` was given.
    pub async fn listar(&self, opciones: &ListarOpciones) -> ApiResult<()> {
        validar_rango(opciones)?;
        let filtrados = self.cargar(opciones).await?;

        if opciones.export {
            let path = export_documentos(&filtrados, &self.export_dir)?;
            println!(
                "Exportado: {} ({} documentos)",
                path.display(),
                filtrados.len()
            );
        } else {
            print!("{}", render_documentos(&filtrados, opciones.page));
        }
        Ok(())
    }

    /// Prints the full field set of one document, line items included.
    pub async fn ver(&self, sk: &str) -> ApiResult<()> {
        let documento = self.buscar(sk).await?;
        print!("{}", render_detalle(&documento));
        Ok(())
    }

    /// Applies field edits to one document and saves it.
    pub async fn editar(&self, sk: &str, cambios: &CambiosDocumento) -> ApiResult<()> {
        if cambios.is_empty() {
            return Err(ApiError::invalid_input("No se indicó ningún campo a editar"));
        }

        let mut documento = self.buscar(sk).await?;
        if !documento.is_editable() {
            return Err(ApiError::invalid_input(
                "El documento está siendo procesado y no puede editarse",
            ));
        }

        cambios.apply(&mut documento);
        self.service.update(&documento).await?;
        println!("Documento {} actualizado.", documento.sk);
        Ok(())
    }

    /// Deletes one document after an interactive confirmation.
    pub async fn borrar(&self, sk: &str) -> ApiResult<()> {
        let pregunta = format!("¿Está seguro que desea eliminar el documento {sk}? (s/N) ");
        if !confirmar(&pregunta)? {
            println!("Operación cancelada.");
            return Ok(());
        }

        self.service.delete(sk).await?;
        println!("Documento {sk} eliminado.");
        Ok(())
    }

    /// Uploads a receipt file and queues it for processing.
    pub async fn subir(&self, archivo: &Path) -> ApiResult<()> {
        let ulid = self.upload.subir_archivo(archivo).await?;
        println!("Archivo enviado a procesamiento ({ulid}).");
        Ok(())
    }

    /// Re-validates the session and reloads the table on every tick until
    /// interrupted. A refresh failure is logged and the loop continues; an
    /// invalidated session ends the watch.
    pub async fn watch(&self, guard: &SessionGuard, opciones: &ListarOpciones) -> ApiResult<()> {
        validar_rango(opciones)?;

        let mut ticker = tokio::time::interval(self.watch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        let filtrados = self.cargar(opciones).await?;
        print!("{}", render_documentos(&filtrados, opciones.page));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("watch interrupted");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if guard.revalidate_now().await == GuardState::Redirecting {
                        return Err(ApiError::InvalidToken);
                    }
                    match self.cargar(opciones).await {
                        Ok(filtrados) => {
                            println!("Actualizado a las {}", Local::now().format("%H:%M:%S"));
                            print!("{}", render_documentos(&filtrados, opciones.page));
                        }
                        Err(e) => warn!("document refresh failed: {e}"),
                    }
                }
            }
        }
    }

    async fn cargar(&self, opciones: &ListarOpciones) -> ApiResult<Vec<Documento>> {
        let documentos = self
            .service
            .list(opciones.desde.as_deref(), opciones.hasta.as_deref())
            .await?;
        Ok(aplicar_filtros(documentos, opciones))
    }

    async fn buscar(&self, sk: &str) -> ApiResult<Documento> {
        let documentos = self.service.list(None, None).await?;
        documentos
            .into_iter()
            .find(|doc| doc.sk == sk)
            .ok_or_else(|| ApiError::invalid_input(format!("No se encontró el documento {sk}")))
    }
}

/// Applies the client-side filters: case-insensitive substring on
/// `enviado_por` and `destinatario`, separator-insensitive substring on
/// `importe`. Blank filters are skipped.
pub fn aplicar_filtros(documentos: Vec<Documento>, opciones: &ListarOpciones) -> Vec<Documento> {
    let mut filtrados = documentos;

    if let Some(filtro) = trimmed(&opciones.enviado_por) {
        let filtro = filtro.to_lowercase();
        filtrados.retain(|doc| doc.enviado_por.to_lowercase().contains(&filtro));
    }

    if let Some(filtro) = trimmed(&opciones.importe) {
        let filtro = normalize_importe(filtro);
        filtrados.retain(|doc| normalize_importe(&doc.importe).contains(&filtro));
    }

    if let Some(filtro) = trimmed(&opciones.destinatario) {
        let filtro = filtro.to_lowercase();
        filtrados.retain(|doc| doc.destinatario.to_lowercase().contains(&filtro));
    }

    filtrados
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// The server-side date filter only works with both ends of the range.
fn validar_rango(opciones: &ListarOpciones) -> ApiResult<()> {
    match (&opciones.desde, &opciones.hasta) {
        (Some(_), None) | (None, Some(_)) => Err(ApiError::invalid_input(
            "El filtro de fechas requiere --desde y --hasta",
        )),
        _ => Ok(()),
    }
}

fn render_documentos(documentos: &[Documento], page: Option<u32>) -> String {
    let total = documentos.len() as u64;
    let paginacion = PaginationFilter {
        page,
        per_page: None,
    }
    .clamped(total);
    let meta = PaginationMeta::new(paginacion.page(), paginacion.per_page(), total);
    let pagina = apply_pagination(documentos.to_vec(), &paginacion);

    let rows: Vec<Vec<String>> = pagina
        .iter()
        .map(|doc| {
            vec![
                doc.sk.clone(),
                doc.cliente.clone(),
                format_date(&doc.fecha_carga),
                format_date(&doc.fecha_comprobante),
                doc.importe.clone(),
                doc.banco.clone(),
                doc.destinatario.clone(),
                doc.tipo.clone(),
                doc.enviado_por.clone(),
                doc.estado.clone(),
            ]
        })
        .collect();

    let mut out = render_table(&DOCUMENTOS_COLUMNS, &rows);
    out.push_str(&format!(
        "Página {} de {} ({} documentos)\n",
        meta.current_page, meta.total_pages, meta.total_items
    ));
    out
}

fn render_detalle(documento: &Documento) -> String {
    let confianza = if documento.promedio_confianza.is_empty() {
        "N/A".to_string()
    } else {
        format!("{}%", documento.promedio_confianza)
    };

    let mut out = format!("Documento {}\n", documento.sk);
    out.push_str(&linea("Cliente:", &documento.cliente));
    out.push_str(&linea("Fecha de carga:", &format_date(&documento.fecha_carga)));
    out.push_str(&linea(
        "Fecha de comprobante:",
        &format_date(&documento.fecha_comprobante),
    ));
    out.push_str(&linea("Importe:", &documento.importe));
    out.push_str(&linea("Número de transacción:", &documento.numero_transaccion));
    out.push_str(&linea("Banco:", &documento.banco));
    out.push_str(&linea("Destinatario:", &documento.destinatario));
    out.push_str(&linea("TRF / Depósito:", &documento.tipo));
    out.push_str(&linea("Enviado por:", &documento.enviado_por));
    out.push_str(&linea("Estado:", &documento.estado));
    out.push_str(&linea("Número de factura:", &documento.numero_factura));
    out.push_str(&linea("Nombre farmacia:", &documento.nombre_farmacia));
    out.push_str(&linea("Nivel de confianza:", &confianza));

    if documento.productos.is_empty() {
        out.push_str("  Sin productos\n");
    } else {
        out.push_str("  Productos:\n");
        for producto in &documento.productos {
            let mut partes = vec![format!("Cant: {}", producto.cantidad)];
            if let Some(precio) = producto.precio_unitario {
                partes.push(format!("Precio Unit: ${precio}"));
            } else {
                if !producto.precio_bruto.is_empty() {
                    partes.push(format!("Bruto: ${}", producto.precio_bruto));
                }
                if !producto.precio_neto.is_empty() {
                    partes.push(format!("Neto: ${}", producto.precio_neto));
                }
                if !producto.precio_subtotal.is_empty() {
                    partes.push(format!("Subtotal: ${}", producto.precio_subtotal));
                }
            }

            let codigo = if producto.codigo_de_articulo.is_empty() {
                String::new()
            } else {
                format!(" [{}]", producto.codigo_de_articulo)
            };
            out.push_str(&format!("    - {}{}\n", producto.descripcion, codigo));
            out.push_str(&format!("      {}\n", partes.join(" | ")));
        }
        if !documento.total_factura.is_empty() {
            out.push_str(&format!("  Total factura: ${}\n", documento.total_factura));
        }
    }

    out
}

fn linea(label: &str, value: &str) -> String {
    format!("  {label:<23} {value}\n")
}
