//! Entry point for the Remesa operations console.
//!
//! Parses the subcommand, loads configuration, wires the session layer
//! (store, identity provider, validator, guard, gateway), and dispatches
//! to the matching workflow. Usage errors exit with status 2, runtime
//! failures with status 1.

mod auth;
mod config;
mod errors;
mod records;
mod services;
mod utils;
mod views;
mod wire;

use crate::auth::{
    ConsoleNavigator, RequestGateway, SessionGuard, SessionStore, TokenValidator, UserPoolProvider,
};
use crate::config::Config;
use crate::errors::{ApiError, SessionError};
use crate::services::{AgendaService, DocumentosService, UploadService};
use crate::views::agenda::AgendaView;
use crate::views::documentos::{CambiosDocumento, DocumentosView, ListarOpciones};
use crate::views::login::LoginView;
use anyhow::Context;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    if let Err(error) = run(&program, &args).await {
        report(&error);
        std::process::exit(1);
    }
}

async fn run(program: &str, args: &[String]) -> anyhow::Result<()> {
    let Some(comando) = args.first() else {
        print_usage(program);
        std::process::exit(2);
    };
    if comando == "-h" || comando == "--help" {
        print_usage(program);
        return Ok(());
    }

    let config = Config::from_env().context("failed to load configuration")?;
    let store = SessionStore::open(&config.state_dir).await?;
    let provider = Arc::new(UserPoolProvider::new(
        config.auth_url.clone(),
        config.client_id.clone(),
        store.clone(),
        config.http_timeout_seconds,
    ));

    match comando.as_str() {
        "login" => {
            let (user, password) = parse_login(program, &args[1..]);
            let view = LoginView::new(provider, store);
            view.login(user, password).await?;
        }
        "logout" => {
            if let Some(extra) = args.get(1) {
                unrecognized(program, extra);
            }
            let view = LoginView::new(provider, store);
            view.logout().await?;
        }
        "documentos" => {
            let cmd = parse_documentos(program, &args[1..]);
            let protected = protect(&config, &store, provider).await?;
            let documentos = DocumentosService::new(
                protected.gateway.clone(),
                config.facturas_api_url.clone(),
                config.agenda_api_url.clone(),
            );
            let upload = UploadService::new(
                protected.gateway.clone(),
                config.facturas_api_url.clone(),
                config.http_timeout_seconds,
            );
            let view = DocumentosView::new(
                documentos,
                upload,
                ".",
                Duration::from_secs(config.watch_interval_seconds),
            );

            match cmd {
                DocumentosCmd::Listar { opciones, watch } => {
                    if watch {
                        view.watch(&protected.guard, &opciones).await?;
                    } else {
                        view.listar(&opciones).await?;
                    }
                }
                DocumentosCmd::Ver { sk } => view.ver(&sk).await?,
                DocumentosCmd::Subir { archivo } => view.subir(&archivo).await?,
                DocumentosCmd::Editar { sk, cambios } => view.editar(&sk, &cambios).await?,
                DocumentosCmd::Borrar { sk } => view.borrar(&sk).await?,
            }
        }
        "agenda" => {
            let cmd = parse_agenda(program, &args[1..]);
            let protected = protect(&config, &store, provider).await?;
            let service =
                AgendaService::new(protected.gateway.clone(), config.agenda_api_url.clone());
            let view = AgendaView::new(service, ".");

            match cmd {
                AgendaCmd::Listar {
                    buscar,
                    page,
                    export,
                } => view.listar(buscar.as_deref(), page, export).await?,
                AgendaCmd::Ver { sk } => view.ver(&sk).await?,
                AgendaCmd::Crear {
                    nombre,
                    mail,
                    celular,
                } => {
                    view.crear(&nombre, mail.as_deref(), celular.as_deref())
                        .await?
                }
                AgendaCmd::Renombrar { sk, nombre } => view.renombrar(&sk, &nombre).await?,
                AgendaCmd::AgregarMail { sk, mail } => view.agregar_mail(&sk, &mail).await?,
                AgendaCmd::AgregarCelular { sk, celular } => {
                    view.agregar_celular(&sk, &celular).await?
                }
                AgendaCmd::EditarMail { sk, mail } => view.editar_mail(&sk, &mail).await?,
                AgendaCmd::EditarCelular { sk, celular } => {
                    view.editar_celular(&sk, &celular).await?
                }
                AgendaCmd::Borrar { sk } => view.borrar(&sk).await?,
            }
        }
        desconocido => {
            eprintln!("Comando desconocido: {desconocido}");
            print_usage(program);
            std::process::exit(2);
        }
    }

    Ok(())
}

struct Protected {
    guard: SessionGuard,
    gateway: Arc<RequestGateway>,
}

/// Mounts the session guard and builds the request gateway for the
/// protected workflows. Fails with an invalid-token error when the
/// stored session does not pass validation.
async fn protect(
    config: &Config,
    store: &SessionStore,
    provider: Arc<UserPoolProvider>,
) -> anyhow::Result<Protected> {
    let navigator = Arc::new(ConsoleNavigator);
    let validator = TokenValidator::new(
        provider,
        store.clone(),
        Duration::from_secs(config.http_timeout_seconds),
    );

    let guard = SessionGuard::mount(
        validator.clone(),
        store.clone(),
        navigator.clone(),
        config.login_path.clone(),
        Duration::from_secs(config.guard_interval_seconds),
    )
    .await;
    if !guard.is_authenticated() {
        return Err(ApiError::InvalidToken.into());
    }

    let gateway = Arc::new(RequestGateway::new(
        validator,
        store.clone(),
        navigator,
        config.login_path.clone(),
        config.http_timeout_seconds,
    ));

    Ok(Protected { guard, gateway })
}

fn report(error: &anyhow::Error) {
    tracing::debug!("command failed: {error:?}");

    if let Some(api) = error.downcast_ref::<ApiError>() {
        // The navigator already told the user to sign in again.
        if !matches!(api, ApiError::InvalidToken) {
            eprintln!("{}", api.user_message());
        }
        return;
    }
    if let Some(session) = error.downcast_ref::<SessionError>() {
        match session {
            SessionError::Authority(message) => eprintln!("{message}"),
            other => eprintln!("{other}"),
        }
        return;
    }
    eprintln!("{error:#}");
}

enum DocumentosCmd {
    Listar {
        opciones: ListarOpciones,
        watch: bool,
    },
    Ver {
        sk: String,
    },
    Subir {
        archivo: PathBuf,
    },
    Editar {
        sk: String,
        cambios: CambiosDocumento,
    },
    Borrar {
        sk: String,
    },
}

enum AgendaCmd {
    Listar {
        buscar: Option<String>,
        page: Option<u32>,
        export: bool,
    },
    Ver {
        sk: String,
    },
    Crear {
        nombre: String,
        mail: Option<String>,
        celular: Option<String>,
    },
    Renombrar {
        sk: String,
        nombre: String,
    },
    AgregarMail {
        sk: String,
        mail: String,
    },
    AgregarCelular {
        sk: String,
        celular: String,
    },
    EditarMail {
        sk: String,
        mail: String,
    },
    EditarCelular {
        sk: String,
        celular: String,
    },
    Borrar {
        sk: String,
    },
}

fn parse_login(program: &str, args: &[String]) -> (Option<String>, Option<String>) {
    let mut user: Option<String> = None;
    let mut password: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--user" => user = Some(flag_value(program, args, i, "--user")),
            "--password" => password = Some(flag_value(program, args, i, "--password")),
            unk => unrecognized(program, unk),
        }
        i += 2;
    }
    (user, password)
}

fn parse_documentos(program: &str, args: &[String]) -> DocumentosCmd {
    match args.first().map(String::as_str) {
        Some("ver") => DocumentosCmd::Ver {
            sk: parse_sk(program, &args[1..]),
        },
        Some("subir") => parse_subir(program, &args[1..]),
        Some("editar") => parse_editar(program, &args[1..]),
        Some("borrar") => DocumentosCmd::Borrar {
            sk: parse_sk(program, &args[1..]),
        },
        _ => parse_documentos_listar(program, args),
    }
}

fn parse_documentos_listar(program: &str, args: &[String]) -> DocumentosCmd {
    let mut opciones = ListarOpciones::default();
    let mut watch = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--desde" => {
                opciones.desde = Some(flag_value(program, args, i, "--desde"));
                i += 2;
            }
            "--hasta" => {
                opciones.hasta = Some(flag_value(program, args, i, "--hasta"));
                i += 2;
            }
            "--enviado-por" => {
                opciones.enviado_por = Some(flag_value(program, args, i, "--enviado-por"));
                i += 2;
            }
            "--destinatario" => {
                opciones.destinatario = Some(flag_value(program, args, i, "--destinatario"));
                i += 2;
            }
            "--importe" => {
                opciones.importe = Some(flag_value(program, args, i, "--importe"));
                i += 2;
            }
            "--page" => {
                opciones.page = Some(parse_page(program, &flag_value(program, args, i, "--page")));
                i += 2;
            }
            "--export" => {
                opciones.export = true;
                i += 1;
            }
            "--watch" => {
                watch = true;
                i += 1;
            }
            unk => unrecognized(program, unk),
        }
    }

    if watch && opciones.export {
        eprintln!("--watch no se puede combinar con --export");
        print_usage(program);
        std::process::exit(2);
    }

    DocumentosCmd::Listar { opciones, watch }
}

fn parse_subir(program: &str, args: &[String]) -> DocumentosCmd {
    let mut archivo: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--archivo" => archivo = Some(flag_value(program, args, i, "--archivo")),
            unk => unrecognized(program, unk),
        }
        i += 2;
    }

    DocumentosCmd::Subir {
        archivo: PathBuf::from(require_flag(program, archivo, "--archivo")),
    }
}

fn parse_editar(program: &str, args: &[String]) -> DocumentosCmd {
    let mut sk: Option<String> = None;
    let mut cambios = CambiosDocumento::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--sk" => sk = Some(flag_value(program, args, i, "--sk")),
            "--cliente" => cambios.cliente = Some(flag_value(program, args, i, "--cliente")),
            "--fecha-carga" => {
                cambios.fecha_carga = Some(flag_value(program, args, i, "--fecha-carga"))
            }
            "--fecha-comprobante" => {
                cambios.fecha_comprobante =
                    Some(flag_value(program, args, i, "--fecha-comprobante"))
            }
            "--importe" => cambios.importe = Some(flag_value(program, args, i, "--importe")),
            "--numero-transaccion" => {
                cambios.numero_transaccion =
                    Some(flag_value(program, args, i, "--numero-transaccion"))
            }
            "--banco" => cambios.banco = Some(flag_value(program, args, i, "--banco")),
            "--destinatario" => {
                cambios.destinatario = Some(flag_value(program, args, i, "--destinatario"))
            }
            "--tipo" => cambios.tipo = Some(flag_value(program, args, i, "--tipo")),
            "--enviado-por" => {
                cambios.enviado_por = Some(flag_value(program, args, i, "--enviado-por"))
            }
            unk => unrecognized(program, unk),
        }
        i += 2;
    }

    DocumentosCmd::Editar {
        sk: require_flag(program, sk, "--sk"),
        cambios,
    }
}

fn parse_agenda(program: &str, args: &[String]) -> AgendaCmd {
    match args.first().map(String::as_str) {
        Some("ver") => AgendaCmd::Ver {
            sk: parse_sk(program, &args[1..]),
        },
        Some("crear") => parse_crear(program, &args[1..]),
        Some("renombrar") => {
            let (sk, nombre) = parse_sk_and(program, &args[1..], "--nombre");
            AgendaCmd::Renombrar { sk, nombre }
        }
        Some("agregar-mail") => {
            let (sk, mail) = parse_sk_and(program, &args[1..], "--mail");
            AgendaCmd::AgregarMail { sk, mail }
        }
        Some("agregar-celular") => {
            let (sk, celular) = parse_sk_and(program, &args[1..], "--celular");
            AgendaCmd::AgregarCelular { sk, celular }
        }
        Some("editar-mail") => {
            let (sk, mail) = parse_sk_and(program, &args[1..], "--mail");
            AgendaCmd::EditarMail { sk, mail }
        }
        Some("editar-celular") => {
            let (sk, celular) = parse_sk_and(program, &args[1..], "--celular");
            AgendaCmd::EditarCelular { sk, celular }
        }
        Some("borrar") => AgendaCmd::Borrar {
            sk: parse_sk(program, &args[1..]),
        },
        _ => parse_agenda_listar(program, args),
    }
}

fn parse_agenda_listar(program: &str, args: &[String]) -> AgendaCmd {
    let mut buscar: Option<String> = None;
    let mut page: Option<u32> = None;
    let mut export = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--buscar" => {
                buscar = Some(flag_value(program, args, i, "--buscar"));
                i += 2;
            }
            "--page" => {
                page = Some(parse_page(program, &flag_value(program, args, i, "--page")));
                i += 2;
            }
            "--export" => {
                export = true;
                i += 1;
            }
            unk => unrecognized(program, unk),
        }
    }

    AgendaCmd::Listar {
        buscar,
        page,
        export,
    }
}

fn parse_crear(program: &str, args: &[String]) -> AgendaCmd {
    let mut nombre: Option<String> = None;
    let mut mail: Option<String> = None;
    let mut celular: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--nombre" => nombre = Some(flag_value(program, args, i, "--nombre")),
            "--mail" => mail = Some(flag_value(program, args, i, "--mail")),
            "--celular" => celular = Some(flag_value(program, args, i, "--celular")),
            unk => unrecognized(program, unk),
        }
        i += 2;
    }

    AgendaCmd::Crear {
        nombre: require_flag(program, nombre, "--nombre"),
        mail,
        celular,
    }
}

fn parse_sk(program: &str, args: &[String]) -> String {
    let mut sk: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--sk" => sk = Some(flag_value(program, args, i, "--sk")),
            unk => unrecognized(program, unk),
        }
        i += 2;
    }

    require_flag(program, sk, "--sk")
}

fn parse_sk_and(program: &str, args: &[String], flag: &str) -> (String, String) {
    let mut sk: Option<String> = None;
    let mut value: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--sk" => sk = Some(flag_value(program, args, i, "--sk")),
            f if f == flag => value = Some(flag_value(program, args, i, flag)),
            unk => unrecognized(program, unk),
        }
        i += 2;
    }

    (
        require_flag(program, sk, "--sk"),
        require_flag(program, value, flag),
    )
}

fn flag_value(program: &str, args: &[String], i: usize, flag: &str) -> String {
    match args.get(i + 1) {
        Some(value) => value.clone(),
        None => {
            eprintln!("{flag} requiere un valor");
            print_usage(program);
            std::process::exit(2);
        }
    }
}

fn require_flag(program: &str, value: Option<String>, flag: &str) -> String {
    value.unwrap_or_else(|| {
        eprintln!("Falta el argumento {flag}");
        print_usage(program);
        std::process::exit(2);
    })
}

fn parse_page(program: &str, raw: &str) -> u32 {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => {
            eprintln!("--page debe ser un número mayor que 0");
            print_usage(program);
            std::process::exit(2);
        }
    }
}

fn unrecognized(program: &str, arg: &str) -> ! {
    eprintln!("Argumento no reconocido: {arg}");
    print_usage(program);
    std::process::exit(2);
}

fn print_usage(program: &str) {
    eprintln!(
        "Uso:
  {program} login [--user U] [--password P]
  {program} logout
  {program} documentos [--desde YYYY-MM-DD] [--hasta YYYY-MM-DD] [--enviado-por S] [--destinatario S] [--importe S] [--page N] [--export] [--watch]
  {program} documentos ver --sk SK
  {program} documentos subir --archivo RUTA
  {program} documentos editar --sk SK [--cliente S] [--fecha-carga F] [--fecha-comprobante F] [--importe S] [--numero-transaccion S] [--banco S] [--destinatario S] [--tipo S] [--enviado-por S]
  {program} documentos borrar --sk SK
  {program} agenda [--buscar S] [--page N] [--export]
  {program} agenda ver --sk SK
  {program} agenda crear --nombre S [--mail M] [--celular C]
  {program} agenda renombrar --sk SK --nombre S
  {program} agenda agregar-mail --sk SK --mail M
  {program} agenda agregar-celular --sk SK --celular C
  {program} agenda editar-mail --sk SK --mail M
  {program} agenda editar-celular --sk SK --celular C
  {program} agenda borrar --sk SK"
    );
}
