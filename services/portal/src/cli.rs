//! Command-line front end: one command per invocation against the hosted backend.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use bytes::Bytes;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use portal_domain::employee::{Cadre, Department, Division};
use portal_domain::family::Relation;
use portal_domain::id::RecordId;
use portal_domain::pass::{PassStatus, PassType, TrainType};

use crate::config::PortalConfig;
use crate::domain::repository::{AuthPort, StoragePort, TablePort};
use crate::domain::types::{
    EmployeeProfile, HealthRecordInput, NewDutyAssignment, NewEmployeePass, NewFamilyMember,
    PassPatch, ProfilePatch, SignUp,
};
use crate::infra::auth::GoTrueAuthClient;
use crate::infra::http::SupabaseHttp;
use crate::infra::rest::RestTableClient;
use crate::infra::storage::StorageClient;
use crate::usecase::bootstrap::ProfileStatus;
use crate::usecase::portal::{EmployeeRecords, Portal};
use crate::usecase::upload::{ImageBuckets, ImageFile, ImageKind, ImageStore};
use crate::usecase::validation::{ProfileForm, SignInForm, SignUpForm};

#[derive(Parser)]
#[command(name = "portal", about = "Employee self-service portal", version)]
pub struct Cli {
    /// Account email, used with --password to sign in
    #[arg(long, env = "PORTAL_EMAIL", global = true)]
    pub email: Option<String>,

    /// Account password
    #[arg(long, env = "PORTAL_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Access token from a previous `sign-in`, used instead of email and password
    #[arg(long, env = "PORTAL_ACCESS_TOKEN", global = true, hide_env_values = true)]
    pub access_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register a new employee account
    SignUp(SignUpArgs),
    /// Sign in and print the access token
    SignIn,
    /// End the session named by the access token
    SignOut,
    /// Profile, pass, family and duty overview with expiry warnings
    Dashboard,
    #[command(subcommand)]
    Profile(ProfileCommand),
    #[command(subcommand)]
    Pass(PassCommand),
    #[command(subcommand)]
    Health(HealthCommand),
    #[command(subcommand)]
    Family(FamilyCommand),
    #[command(subcommand)]
    Duty(DutyCommand),
}

#[derive(Args)]
pub struct SignUpArgs {
    #[arg(long)]
    pub confirm_password: String,
    #[arg(long)]
    pub employee_id: String,
    #[command(flatten)]
    pub details: DetailsArgs,
}

/// Employee details. Omitted fields keep their current value when editing.
#[derive(Args)]
pub struct DetailsArgs {
    #[arg(long)]
    pub full_name: Option<String>,
    #[arg(long)]
    pub cadre: Option<Cadre>,
    #[arg(long)]
    pub department: Option<Department>,
    #[arg(long)]
    pub division: Option<Division>,
    #[arg(long)]
    pub designation: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub date_of_birth: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub date_of_joining: Option<String>,
    #[arg(long)]
    pub phone_number: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
}

impl DetailsArgs {
    /// Fill a form from these arguments, falling back to `current` field by field.
    fn into_form(self, current: Option<&EmployeeProfile>) -> ProfileForm {
        let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
        ProfileForm {
            full_name: self
                .full_name
                .or_else(|| current.map(|p| p.full_name.clone()))
                .unwrap_or_default(),
            cadre: self.cadre.or(current.map(|p| p.cadre)).unwrap_or_default(),
            department: self
                .department
                .or(current.map(|p| p.department))
                .unwrap_or_default(),
            division: self
                .division
                .or(current.map(|p| p.division))
                .unwrap_or_default(),
            designation: self
                .designation
                .or_else(|| current.map(|p| p.designation.clone()))
                .unwrap_or_default(),
            date_of_birth: self
                .date_of_birth
                .unwrap_or_else(|| date(current.and_then(|p| p.date_of_birth))),
            date_of_joining: self
                .date_of_joining
                .unwrap_or_else(|| date(current.and_then(|p| p.date_of_joining))),
            phone_number: self
                .phone_number
                .or_else(|| current.map(|p| p.phone_number.clone()))
                .unwrap_or_default(),
            address: self
                .address
                .or_else(|| current.map(|p| p.address.clone()))
                .unwrap_or_default(),
        }
    }
}

#[derive(Subcommand)]
pub enum ProfileCommand {
    Show,
    Edit(DetailsArgs),
    /// Upload a new profile photo and link it to the profile
    Photo(PhotoArgs),
    /// Unlink the profile photo and delete it from storage
    RemovePhoto,
}

#[derive(Args)]
pub struct PhotoArgs {
    pub file: PathBuf,
    /// MIME type; guessed from the file extension when omitted
    #[arg(long)]
    pub content_type: Option<String>,
}

#[derive(Subcommand)]
pub enum PassCommand {
    List,
    /// Active passes expiring within 30 days
    Expiring,
    Add(PassArgs),
    /// Change the status of a pass
    Status { id: RecordId, status: PassStatus },
    Delete { id: RecordId },
}

#[derive(Args)]
pub struct PassArgs {
    #[arg(long)]
    pub pass_type: PassType,
    #[arg(long)]
    pub train_type: TrainType,
    #[arg(long)]
    pub origin: String,
    #[arg(long)]
    pub destination: String,
    #[arg(long)]
    pub issue_date: NaiveDate,
    #[arg(long)]
    pub expiry_date: NaiveDate,
    #[arg(long, default_value = "active")]
    pub status: PassStatus,
    #[arg(long)]
    pub remarks: Option<String>,
}

#[derive(Subcommand)]
pub enum HealthCommand {
    Show,
    /// Replace the health record; omitted fields are cleared
    Set(HealthArgs),
}

#[derive(Args)]
pub struct HealthArgs {
    #[arg(long)]
    pub blood_group: Option<String>,
    #[arg(long)]
    pub allergies: Option<String>,
    #[arg(long)]
    pub chronic_conditions: Option<String>,
    #[arg(long)]
    pub last_medical_check: Option<NaiveDate>,
    #[arg(long)]
    pub next_medical_due: Option<NaiveDate>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Subcommand)]
pub enum FamilyCommand {
    List,
    Add(FamilyArgs),
    Delete { id: RecordId },
}

#[derive(Args)]
pub struct FamilyArgs {
    #[arg(long)]
    pub full_name: String,
    #[arg(long)]
    pub relation: Relation,
    #[arg(long)]
    pub date_of_birth: Option<NaiveDate>,
    /// Photo uploaded before the member is added
    #[arg(long)]
    pub photo: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum DutyCommand {
    List,
    Add(DutyArgs),
    Delete { id: RecordId },
}

#[derive(Args)]
pub struct DutyArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub duty_date: NaiveDate,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub shift: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

pub async fn run(cli: Cli, config: PortalConfig) -> Result<()> {
    let http = SupabaseHttp::new(&config.supabase_url, config.supabase_anon_key.clone())?;
    let mut auth = GoTrueAuthClient::new(http.clone());
    if let Some(token) = cli.access_token.clone() {
        auth = auth.with_access_token(token);
    }
    let portal = Portal::new(auth, RestTableClient::new(http.clone()));
    let images = ImageStore::new(
        StorageClient::new(http.clone()),
        ImageBuckets {
            profile: config.profile_bucket,
            family: config.family_bucket,
        },
    );

    match cli.command {
        Command::SignUp(args) => {
            let (email, password) = credentials(cli.email.as_deref(), cli.password.as_deref())?;
            let form = SignUpForm {
                email,
                password,
                confirm_password: args.confirm_password,
                employee_id: args.employee_id,
                profile: args.details.into_form(None),
            };
            form.validate()?;
            let outcome = portal
                .session()
                .sign_up(&form.email, &form.password, form.to_metadata())
                .await?;
            match outcome {
                SignUp::SignedIn(identity) => {
                    println!("Account created for {}", identity.email.as_deref().unwrap_or("?"));
                    let records = portal.require_records()?;
                    report_profile(records.ensure_profile().await?);
                }
                SignUp::ConfirmationPending(_) => {
                    println!("Account created. Confirm your email address, then sign in.");
                }
            }
            Ok(())
        }
        Command::SignIn => {
            sign_in(&portal, cli.email.as_deref(), cli.password.as_deref(), None).await?;
            println!("{}", http.token().unwrap_or_default());
            Ok(())
        }
        Command::SignOut => {
            portal.session().restore().await?;
            portal.session().sign_out().await?;
            println!("Signed out");
            Ok(())
        }
        command => {
            sign_in(
                &portal,
                cli.email.as_deref(),
                cli.password.as_deref(),
                cli.access_token.as_deref(),
            )
            .await?;
            let records = portal.require_records()?;
            dispatch(command, &records, &images).await
        }
    }
}

fn credentials(email: Option<&str>, password: Option<&str>) -> Result<(String, String)> {
    match (email, password) {
        (Some(email), Some(password)) => Ok((email.to_owned(), password.to_owned())),
        _ => bail!("--email and --password (or PORTAL_EMAIL and PORTAL_PASSWORD) are required"),
    }
}

async fn sign_in<A: AuthPort, P: TablePort + Clone>(
    portal: &Portal<A, P>,
    email: Option<&str>,
    password: Option<&str>,
    access_token: Option<&str>,
) -> Result<()> {
    if access_token.is_some() {
        if portal.session().restore().await?.is_none() {
            bail!("access token was rejected; sign in again");
        }
        return Ok(());
    }
    let (email, password) = credentials(email, password)?;
    let form = SignInForm { email, password };
    form.validate()?;
    portal.session().sign_in(&form.email, &form.password).await?;
    Ok(())
}

async fn dispatch<P: TablePort, S: StoragePort>(
    command: Command,
    records: &EmployeeRecords<P>,
    images: &ImageStore<S>,
) -> Result<()> {
    let owner = records.identity().id;
    match command {
        Command::Dashboard => {
            let refresh = records.refresh().await;
            match refresh.profile {
                Ok(status) => report_profile(status),
                Err(e) => eprintln!("profile: {e}"),
            }
            for failure in &refresh.failures {
                eprintln!("{}: {}", failure.table, failure.error);
            }
            let passes = records.passes.rows();
            println!(
                "{} passes, {} family members, {} duties",
                passes.len(),
                records.family.rows().len(),
                records.duties.rows().len()
            );
            for pass in records.passes.expiring_soon() {
                println!(
                    "Renewal due: {} pass {} -> {} expires {}",
                    pass.pass_type, pass.origin, pass.destination, pass.expiry_date
                );
            }
        }

        Command::Profile(ProfileCommand::Show) => match records.profile.fetch().await? {
            Some(profile) => print_json(&profile)?,
            None => println!("No profile yet"),
        },
        Command::Profile(ProfileCommand::Edit(details)) => {
            let Some(current) = records.ensure_profile().await?.profile().cloned() else {
                bail!("no profile to edit");
            };
            let patch = details.into_form(Some(&current)).to_patch()?;
            print_json(&records.profile.update(current.id, patch).await?)?;
        }
        Command::Profile(ProfileCommand::Photo(args)) => {
            let Some(current) = records.profile.fetch().await? else {
                bail!("no profile to attach a photo to");
            };
            let file = read_image(&args.file, args.content_type).await?;
            let url = images.upload(ImageKind::Profile, owner, &file).await?;
            let patch = ProfilePatch {
                profile_image_url: Some(Some(url.clone())),
                ..Default::default()
            };
            records.profile.update(current.id, patch).await?;
            if let Some(old) = current.profile_image_url {
                images.delete(ImageKind::Profile, &old).await?;
            }
            println!("{url}");
        }
        Command::Profile(ProfileCommand::RemovePhoto) => {
            let Some(current) = records.profile.fetch().await? else {
                bail!("no profile to remove a photo from");
            };
            let Some(old) = current.profile_image_url else {
                bail!("profile has no photo");
            };
            let patch = ProfilePatch {
                profile_image_url: Some(None),
                ..Default::default()
            };
            print_json(&records.profile.update(current.id, patch).await?)?;
            images.delete(ImageKind::Profile, &old).await?;
        }

        Command::Pass(PassCommand::List) => print_json(&records.passes.fetch_all().await?)?,
        Command::Pass(PassCommand::Expiring) => {
            records.passes.fetch_all().await?;
            print_json(&records.passes.expiring_soon())?;
        }
        Command::Pass(PassCommand::Add(args)) => {
            let new = NewEmployeePass {
                pass_type: args.pass_type,
                train_type: args.train_type,
                origin: args.origin,
                destination: args.destination,
                issue_date: args.issue_date,
                expiry_date: args.expiry_date,
                status: args.status,
                remarks: args.remarks,
            };
            print_json(&records.passes.add(new).await?)?;
        }
        Command::Pass(PassCommand::Status { id, status }) => {
            let patch = PassPatch {
                status: Some(status),
                ..Default::default()
            };
            print_json(&records.passes.update(id, patch).await?)?;
        }
        Command::Pass(PassCommand::Delete { id }) => records.passes.delete(id).await?,

        Command::Health(HealthCommand::Show) => match records.health.fetch().await? {
            Some(record) => print_json(&record)?,
            None => println!("No health record yet"),
        },
        Command::Health(HealthCommand::Set(args)) => {
            let input = HealthRecordInput {
                blood_group: args.blood_group,
                allergies: args.allergies,
                chronic_conditions: args.chronic_conditions,
                last_medical_check: args.last_medical_check,
                next_medical_due: args.next_medical_due,
                notes: args.notes,
            };
            print_json(&records.health.upsert(input).await?)?;
        }

        Command::Family(FamilyCommand::List) => print_json(&records.family.fetch_all().await?)?,
        Command::Family(FamilyCommand::Add(args)) => {
            let profile_image_url = match args.photo {
                Some(path) => {
                    let file = read_image(&path, None).await?;
                    Some(images.upload(ImageKind::Family, owner, &file).await?)
                }
                None => None,
            };
            let new = NewFamilyMember {
                full_name: args.full_name,
                relation: args.relation,
                date_of_birth: args.date_of_birth,
                profile_image_url,
            };
            print_json(&records.family.add(new).await?)?;
        }
        Command::Family(FamilyCommand::Delete { id }) => records.family.delete(id).await?,

        Command::Duty(DutyCommand::List) => print_json(&records.duties.fetch_all().await?)?,
        Command::Duty(DutyCommand::Add(args)) => {
            let new = NewDutyAssignment {
                title: args.title,
                location: args.location,
                duty_date: args.duty_date,
                shift: args.shift,
                notes: args.notes,
            };
            print_json(&records.duties.add(new).await?)?;
        }
        Command::Duty(DutyCommand::Delete { id }) => records.duties.delete(id).await?,

        Command::SignUp(_) | Command::SignIn | Command::SignOut => {
            unreachable!("handled before sign-in")
        }
    }
    Ok(())
}

fn report_profile(status: ProfileStatus) {
    match status {
        ProfileStatus::Existing(p) => println!("Profile: {} ({})", p.full_name, p.employee_id),
        ProfileStatus::Created(p) => {
            println!("Profile created: {} ({})", p.full_name, p.employee_id)
        }
        ProfileStatus::Missing { error: Some(e) } => {
            println!("Profile could not be created ({e}); create it with `portal profile edit`")
        }
        ProfileStatus::Missing { error: None } => println!("No profile yet"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("encode output")?);
    Ok(())
}

async fn read_image(path: &Path, content_type: Option<String>) -> Result<ImageFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content_type = content_type.unwrap_or_else(|| guess_content_type(&name).to_owned());
    Ok(ImageFile {
        name,
        content_type,
        bytes: Bytes::from(bytes),
    })
}

fn guess_content_type(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
