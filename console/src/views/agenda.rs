//! Agenda workflow: grouped contact listing with search, per-contact
//! detail, create and edit operations, and spreadsheet export.

use crate::errors::{ApiError, ApiResult};
use crate::records::{Contacto, ContactoItem};
use crate::services::AgendaService;
use crate::services::export::export_contactos;
use crate::utils::{PaginationFilter, PaginationMeta, apply_pagination};
use crate::views::{confirmar, render_table};
use std::path::PathBuf;

const CONTACTOS_COLUMNS: [&str; 4] = ["SK", "CLIENTE", "MAILS", "CELULARES"];

pub struct AgendaView {
    service: AgendaService,
    export_dir: PathBuf,
}

impl AgendaView {
    pub fn new(service: AgendaService, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            service,
            export_dir: export_dir.into(),
        }
    }

    /// Lists contacts as a table, or exports the filtered set when
    /// `--export` was given.
    pub async fn listar(
        &self,
        buscar: Option<&str>,
        page: Option<u32>,
        export: bool,
    ) -> ApiResult<()> {
        let contactos = self.service.list().await?;
        let filtrados = filtrar_contactos(contactos, buscar);

        if export {
            let path = export_contactos(&filtrados, &self.export_dir)?;
            println!(
                "Exportado: {} ({} contactos)",
                path.display(),
                filtrados.len()
            );
        } else {
            print!("{}", render_contactos(&filtrados, page));
        }
        Ok(())
    }

    /// Prints one contact with the sort key of every mail and phone
    /// entry, which the edit and delete commands take.
    pub async fn ver(&self, sk: &str) -> ApiResult<()> {
        let contactos = self.service.list().await?;
        let contacto = contactos
            .into_iter()
            .find(|c| c.sk == sk)
            .ok_or_else(|| ApiError::invalid_input(format!("No se encontró el contacto {sk}")))?;

        print!("{}", render_contacto(&contacto));
        Ok(())
    }

    pub async fn crear(
        &self,
        nombre: &str,
        mail: Option<&str>,
        celular: Option<&str>,
    ) -> ApiResult<()> {
        let sk = self.service.create_contacto(nombre, mail, celular).await?;
        println!("Contacto creado ({sk}).");
        Ok(())
    }

    pub async fn renombrar(&self, sk: &str, nombre: &str) -> ApiResult<()> {
        self.service.rename_contacto(sk, nombre).await?;
        println!("Contacto renombrado.");
        Ok(())
    }

    pub async fn agregar_mail(&self, sk: &str, mail: &str) -> ApiResult<()> {
        self.service.add_mail(sk, mail).await?;
        println!("Email agregado.");
        Ok(())
    }

    pub async fn agregar_celular(&self, sk: &str, celular: &str) -> ApiResult<()> {
        self.service.add_celular(sk, celular).await?;
        println!("Celular agregado.");
        Ok(())
    }

    pub async fn editar_mail(&self, sk: &str, mail: &str) -> ApiResult<()> {
        self.service.edit_mail(sk, mail).await?;
        println!("Email actualizado.");
        Ok(())
    }

    pub async fn editar_celular(&self, sk: &str, celular: &str) -> ApiResult<()> {
        self.service.edit_celular(sk, celular).await?;
        println!("Celular actualizado.");
        Ok(())
    }

    /// Deletes one agenda element (contact, mail, or phone) after an
    /// interactive confirmation.
    pub async fn borrar(&self, sk: &str) -> ApiResult<()> {
        if !confirmar(&pregunta_de_borrado(sk))? {
            println!("Operación cancelada.");
            return Ok(());
        }

        self.service.delete_element(sk).await?;
        println!("Elemento {sk} eliminado.");
        Ok(())
    }
}

/// One search text matched case-insensitively against the name, every
/// mail, and every phone. Blank searches return everything.
pub fn filtrar_contactos(contactos: Vec<Contacto>, buscar: Option<&str>) -> Vec<Contacto> {
    let Some(filtro) = buscar.map(str::trim).filter(|b| !b.is_empty()) else {
        return contactos;
    };
    let filtro = filtro.to_lowercase();

    contactos
        .into_iter()
        .filter(|contacto| {
            contacto.cliente.to_lowercase().contains(&filtro)
                || contiene(&contacto.mails, &filtro)
                || contiene(&contacto.celulares, &filtro)
        })
        .collect()
}

fn contiene(items: &[ContactoItem], filtro: &str) -> bool {
    items
        .iter()
        .any(|item| item.value.to_lowercase().contains(filtro))
}

fn pregunta_de_borrado(sk: &str) -> String {
    if sk.contains("#mail#") {
        format!("¿Está seguro que desea eliminar el email {sk}? (s/N) ")
    } else if sk.contains("#numero#") {
        format!("¿Está seguro que desea eliminar el celular {sk}? (s/N) ")
    } else {
        format!(
            "¿Está seguro que desea eliminar el cliente {sk} y todos sus datos asociados? (s/N) "
        )
    }
}

fn render_contactos(contactos: &[Contacto], page: Option<u32>) -> String {
    let total = contactos.len() as u64;
    let paginacion = PaginationFilter {
        page,
        per_page: None,
    }
    .clamped(total);
    let meta = PaginationMeta::new(paginacion.page(), paginacion.per_page(), total);
    let pagina = apply_pagination(contactos.to_vec(), &paginacion);

    let rows: Vec<Vec<String>> = pagina
        .iter()
        .map(|contacto| {
            vec![
                contacto.sk.clone(),
                contacto.cliente.clone(),
                join_values(&contacto.mails),
                join_values(&contacto.celulares),
            ]
        })
        .collect();

    let mut out = render_table(&CONTACTOS_COLUMNS, &rows);
    out.push_str(&format!(
        "Página {} de {} ({} contactos)\n",
        meta.current_page, meta.total_pages, meta.total_items
    ));
    out
}

fn render_contacto(contacto: &Contacto) -> String {
    let mut out = format!("Contacto {} ({})\n", contacto.cliente, contacto.sk);

    if contacto.mails.is_empty() {
        out.push_str("  Sin emails\n");
    } else {
        out.push_str("  Emails:\n");
        for mail in &contacto.mails {
            out.push_str(&format!("    {} ({})\n", mail.value, mail.sk));
        }
    }

    if contacto.celulares.is_empty() {
        out.push_str("  Sin celulares\n");
    } else {
        out.push_str("  Celulares:\n");
        for celular in &contacto.celulares {
            out.push_str(&format!("    {} ({})\n", celular.value, celular.sk));
        }
    }

    out
}

fn join_values(items: &[ContactoItem]) -> String {
    items
        .iter()
        .map(|item| item.value.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contacto(sk: &str, cliente: &str, mails: &[&str], celulares: &[&str]) -> Contacto {
        let items = |values: &[&str], kind: &str| {
            values
                .iter()
                .enumerate()
                .map(|(i, value)| ContactoItem {
                    sk: format!("{sk}#{kind}#{i}"),
                    value: value.to_string(),
                })
                .collect()
        };

        Contacto {
            id: sk.split('#').nth(1).unwrap_or_default().to_string(),
            sk: sk.to_string(),
            cliente: cliente.to_string(),
            mails: items(mails, "mail"),
            celulares: items(celulares, "numero"),
        }
    }

    #[test]
    fn test_search_matches_name_mail_and_phone() {
        let contactos = vec![
            contacto("cliente#1", "Farmacia Norte", &["norte@mail.com"], &[]),
            contacto("cliente#2", "Distribuidora Sur", &[], &["+5491155550000"]),
            contacto("cliente#3", "Otro", &["ventas@otro.com"], &[]),
        ];

        let por_nombre = filtrar_contactos(contactos.clone(), Some("NORTE"));
        assert_eq!(por_nombre.len(), 1);
        assert_eq!(por_nombre[0].sk, "cliente#1");

        let por_mail = filtrar_contactos(contactos.clone(), Some("ventas@"));
        assert_eq!(por_mail.len(), 1);
        assert_eq!(por_mail[0].sk, "cliente#3");

        let por_celular = filtrar_contactos(contactos, Some("5555"));
        assert_eq!(por_celular.len(), 1);
        assert_eq!(por_celular[0].sk, "cliente#2");
    }

    #[test]
    fn test_blank_search_returns_everything() {
        let contactos = vec![
            contacto("cliente#1", "Uno", &[], &[]),
            contacto("cliente#2", "Dos", &[], &[]),
        ];

        assert_eq!(filtrar_contactos(contactos.clone(), None).len(), 2);
        assert_eq!(filtrar_contactos(contactos, Some("  ")).len(), 2);
    }

    #[test]
    fn test_table_joins_child_values() {
        let contactos = vec![contacto(
            "cliente#1",
            "Norte",
            &["a@x.com", "b@x.com"],
            &["+54911"],
        )];

        let out = render_contactos(&contactos, None);
        assert!(out.contains("| a@x.com, b@x.com |"));
        assert!(out.contains("| +54911 "));
        assert!(out.contains("Página 1 de 1 (1 contactos)"));
    }

    #[test]
    fn test_detail_lists_child_sort_keys() {
        let c = contacto("cliente#1", "Norte", &["a@x.com"], &[]);
        let out = render_contacto(&c);

        assert!(out.starts_with("Contacto Norte (cliente#1)"));
        assert!(out.contains("a@x.com (cliente#1#mail#0)"));
        assert!(out.contains("Sin celulares"));
    }

    #[test]
    fn test_delete_question_names_the_element_kind() {
        assert!(pregunta_de_borrado("cliente#1#mail#2").contains("el email"));
        assert!(pregunta_de_borrado("cliente#1#numero#2").contains("el celular"));
        assert!(pregunta_de_borrado("cliente#1").contains("todos sus datos asociados"));
    }
}
