//! Command handlers.
//!
//! Every command builds the same composition root: config, storage backend,
//! session store and the bus listeners that report session changes.

use std::io::IsTerminal;

use anyhow::{Context as _, Result, bail};
use serde::Serialize;
use tokio::io::AsyncBufReadExt;

use campus_session::client::SESSION_EXPIRED_MESSAGE;
use campus_session::{
    AccessRecord, AccessService, ClientConfig, Device, DeviceService, DeviceUpdate, ErrorKind,
    InvalidationReason, NewDevice, ProfileUpdate, SessionStatus, SessionStore, StorageAdapter,
    UserProfile,
};

use super::args::{
    Cli, Commands, DeviceCommand, HistoryArgs, LoginArgs, PasswordCommand, ProfileCommand,
    RegisterArgs, ScanArgs,
};
use crate::styled_output::{
    MessageType, print_dim, print_error, print_success, print_warning, styled_label,
};

/// State shared by all handlers of one invocation.
struct Context {
    config: ClientConfig,
    store: SessionStore,
    json: bool,
}

impl Context {
    fn build(cli: &Cli) -> Result<Self> {
        let dirs = campus_common::get_app_dirs().context("Could not determine home directory")?;
        dirs.ensure_dirs().with_context(|| {
            format!("Failed to create campus home at {}", dirs.home.display())
        })?;

        let mut config = ClientConfig::load(&dirs.home)?;
        if let Some(url) = &cli.api_url {
            config = config.with_base_url(url.as_str())?;
        }
        if let Some(kind) = cli.storage {
            config.storage.backend = kind;
        }

        let storage = StorageAdapter::from_kind(config.storage.backend, &dirs.home);
        let store = SessionStore::new(&config, storage)?;

        store.subscribe(|status| tracing::debug!(%status, "Session status changed"));
        store.invalidation_bus().subscribe(|reason| {
            if *reason == InvalidationReason::SessionExpired {
                print_warning(SESSION_EXPIRED_MESSAGE);
            }
        });

        tracing::debug!(
            base_url = %config.api.base_url,
            storage = store.storage().backend_name(),
            "Client ready"
        );

        Ok(Self {
            config,
            store,
            json: cli.json,
        })
    }

    /// Restore the stored session. Commands that need one fail later with
    /// `NotAuthenticated` when this does not leave the store signed in.
    async fn restore(&self) -> SessionStatus {
        self.store.hydrate().await
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text(value);
        }
        Ok(())
    }
}

/// Run the parsed command.
pub async fn dispatch_command(cli: Cli) -> Result<()> {
    let ctx = Context::build(&cli)?;

    match cli.command {
        Commands::Login(args) => run_login(&ctx, args).await,
        Commands::Register(args) => run_register(&ctx, args).await,
        Commands::Logout => run_logout(&ctx).await,
        Commands::Status => run_status(&ctx).await,
        Commands::Profile(cmd) => run_profile(&ctx, cmd).await,
        Commands::Password(cmd) => run_password(&ctx, cmd).await,
        Commands::Devices(cmd) => run_devices(&ctx, cmd).await,
        Commands::Scan(args) => run_scan(&ctx, args).await,
        Commands::History(args) => run_history(&ctx, args).await,
    }
}

/// Use the flag value or read one line from stdin.
async fn resolve_password(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    if std::io::stdin().is_terminal() {
        eprint!("Password: ");
    }
    let mut line = String::new();
    tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("No password provided");
    }
    Ok(password)
}

fn print_profile(user: &UserProfile) {
    println!("{} <{}>", user.full_name, user.email);
    println!("  Student ID: {}", user.student_id);
    if let Some(role) = &user.role {
        println!("  Role:       {role}");
    }
    if !user.is_active {
        println!("  Account is inactive");
    }
}

async fn run_login(ctx: &Context, args: LoginArgs) -> Result<()> {
    let password = resolve_password(args.password).await?;
    let user = ctx.store.login(&args.email, &password).await?;
    print_success(&format!("Signed in as {} ({})", user.full_name, user.student_id));
    print_dim(&format!(
        "Token stored in {}",
        ctx.store.storage().backend_name()
    ));
    Ok(())
}

async fn run_register(ctx: &Context, args: RegisterArgs) -> Result<()> {
    let password = resolve_password(args.password).await?;
    let user = ctx
        .store
        .register(&args.email, &password, &args.full_name, &args.student_id)
        .await?;
    print_success(&format!("Account created for {}", user.email));
    Ok(())
}

async fn run_logout(ctx: &Context) -> Result<()> {
    ctx.store.logout().await;
    print_success("Signed out");
    Ok(())
}

async fn run_status(ctx: &Context) -> Result<()> {
    let status = ctx.restore().await;

    #[derive(Serialize)]
    struct StatusReport {
        status: SessionStatus,
        user: Option<UserProfile>,
        api: String,
        storage: &'static str,
    }

    let report = StatusReport {
        status,
        user: ctx.store.user(),
        api: ctx.config.api.base_url.clone(),
        storage: ctx.store.storage().backend_name(),
    };

    ctx.emit(&report, |report| {
        let label = if report.status == SessionStatus::Authenticated {
            styled_label(MessageType::Success, &report.status.to_string())
        } else {
            styled_label(MessageType::Dim, &report.status.to_string())
        };
        println!("Status:  {label}");
        println!("API:     {}", report.api);
        println!("Storage: {}", report.storage);
        if let Some(user) = &report.user {
            println!();
            print_profile(user);
        }
    })
}

async fn run_profile(ctx: &Context, cmd: ProfileCommand) -> Result<()> {
    ctx.restore().await;
    match cmd {
        ProfileCommand::Show => {
            let user = ctx.store.refresh_profile().await?;
            ctx.emit(&user, print_profile)
        }
        ProfileCommand::Update {
            full_name,
            email,
            profile_photo,
        } => {
            let changes = ProfileUpdate {
                full_name,
                email,
                profile_photo,
            };
            if changes.is_empty() {
                bail!("Nothing to update; pass --name, --email or --photo");
            }
            let user = ctx.store.update_profile(&changes).await?;
            print_success("Profile updated");
            ctx.emit(&user, print_profile)
        }
    }
}

async fn run_password(ctx: &Context, cmd: PasswordCommand) -> Result<()> {
    match cmd {
        PasswordCommand::Change {
            current,
            new_password,
        } => {
            ctx.restore().await;
            ctx.store.change_password(&current, &new_password).await?;
            print_success("Password changed");
        }
        PasswordCommand::Reset { email } => {
            ctx.store.request_password_reset(&email).await?;
            print_success(&format!(
                "If {email} has an account, a reset link is on its way"
            ));
        }
    }
    Ok(())
}

fn print_device(device: &Device) {
    println!(
        "{}  {}  ({}, {})",
        device.id, device.name, device.device_type, device.serial_number
    );
}

fn print_history(records: &[AccessRecord]) {
    if records.is_empty() {
        print_dim("No access recorded yet");
        return;
    }
    for record in records {
        println!(
            "{}  {:<7}  {:<20}  {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.access_type,
            record.device_name.as_deref().unwrap_or("-"),
            record.location.as_deref().unwrap_or("-"),
        );
    }
}

async fn run_devices(ctx: &Context, cmd: DeviceCommand) -> Result<()> {
    ctx.restore().await;
    let devices = DeviceService::new(ctx.store.api().clone());

    match cmd {
        DeviceCommand::List => {
            let list = devices.list().await?;
            ctx.emit(&list, |list| {
                if list.is_empty() {
                    print_dim("No devices registered");
                }
                list.iter().for_each(print_device);
            })
        }
        DeviceCommand::Show { id } => {
            let device = devices.get(id).await?;
            ctx.emit(&device, |device| {
                print_device(device);
                println!("  QR: {}", device.qr_data);
            })
        }
        DeviceCommand::Qr { id } => {
            let qr = devices.qr(id).await?;
            ctx.emit(&qr, |qr| println!("{}", qr.qr_data))
        }
        DeviceCommand::Add {
            name,
            device_type,
            serial_number,
        } => {
            let created = devices
                .create(&NewDevice {
                    name,
                    device_type,
                    serial_number,
                })
                .await?;
            print_success(&format!("Device registered: {}", created.device.id));
            ctx.emit(&created, |created| println!("{}", created.device.qr_data))
        }
        DeviceCommand::Update {
            id,
            name,
            device_type,
            serial_number,
        } => {
            let device = devices
                .update(
                    id,
                    &DeviceUpdate {
                        name,
                        device_type,
                        serial_number,
                    },
                )
                .await?;
            print_success("Device updated");
            ctx.emit(&device, print_device)
        }
        DeviceCommand::Remove { id } => {
            devices.delete(id).await?;
            print_success(&format!("Device {id} removed"));
            Ok(())
        }
        DeviceCommand::History { id, limit } => {
            let access = AccessService::new(ctx.store.api().clone(), &ctx.config.scan);
            let records = access.device_history(id, limit).await?;
            ctx.emit(&records, |records| print_history(records))
        }
    }
}

async fn run_scan(ctx: &Context, args: ScanArgs) -> Result<()> {
    ctx.restore().await;

    let mut access = AccessService::new(ctx.store.api().clone(), &ctx.config.scan);
    if let Some(access_type) = args.access_type {
        access = access.with_access_type(access_type);
    }
    if args.location.is_some() {
        access = access.with_location(args.location);
    }

    let mut failed = 0usize;
    if args.codes.is_empty() {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if !line.trim().is_empty() && !submit_scan(ctx, &access, &line).await? {
                failed += 1;
            }
        }
    } else {
        for code in &args.codes {
            if !submit_scan(ctx, &access, code).await? {
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} scan(s) could not be recorded");
    }
    Ok(())
}

/// Returns false when the backend rejected the scan. Repeats swallowed by
/// the gate are not failures.
async fn submit_scan(ctx: &Context, access: &AccessService, code: &str) -> Result<bool> {
    match access.record_scan(code).await {
        Ok(record) => {
            if ctx.json {
                println!("{}", serde_json::to_string(&record)?);
            } else {
                print_success(&format!(
                    "{} recorded for {}",
                    record.access_type,
                    record
                        .device_name
                        .as_deref()
                        .or(record.user_name.as_deref())
                        .unwrap_or("device")
                ));
            }
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::ScanInProgress => {
            print_dim("Repeated scan ignored");
            Ok(true)
        }
        Err(e) => {
            print_error(&format!("{}: {}", e.kind(), e.message()));
            Ok(false)
        }
    }
}

async fn run_history(ctx: &Context, args: HistoryArgs) -> Result<()> {
    ctx.restore().await;
    let access = AccessService::new(ctx.store.api().clone(), &ctx.config.scan);
    let records = access.history(args.limit).await?;
    ctx.emit(&records, |records| print_history(records))
}
