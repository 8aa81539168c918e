//! Command handlers. Each one reports failures as notices and returns the
//! process exit code.

use crate::app::App;
use crate::terminal::TerminalNotifier;
use anyhow::Context;
use backend_client::Role;
use label_catalog::{
    group_by_role, CatalogError, CreateOutcome, NewArtist, NewTeamMember, ProfileForm,
};
use session_auth::{AuthError, GuardView, Notice, Notifier, RouteGuard};
use std::path::Path;
use std::process::ExitCode;

fn outcome<T>(result: Result<T, AuthError>) -> ExitCode {
    // The controller has already shown the failure.
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

fn catalog_failure(err: CatalogError) -> ExitCode {
    TerminalNotifier.notify(Notice::error(err.user_message()));
    ExitCode::FAILURE
}

fn success(message: &str) {
    TerminalNotifier.notify(Notice::success(message));
}

async fn read_image(path: &Path) -> anyhow::Result<(String, Vec<u8>)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((file_name, bytes))
}

pub async fn sign_up(app: &App, email: &str, password: &str, full_name: &str) -> ExitCode {
    outcome(app.controller.sign_up(email, password, full_name).await)
}

pub async fn sign_in(app: &App, email: &str, password: &str) -> ExitCode {
    outcome(app.controller.sign_in(email, password).await)
}

pub async fn sign_out(app: &App) -> ExitCode {
    outcome(app.controller.sign_out().await)
}

pub fn who_am_i(app: &App) -> ExitCode {
    match app.store.current_identity() {
        Some(identity) => {
            println!("id:        {}", identity.id);
            println!("email:     {}", identity.email.as_deref().unwrap_or("-"));
            println!("full name: {}", identity.full_name().unwrap_or("-"));
            if let Some(session) = app.store.current_session() {
                println!("expires:   {}", session.expires_at.to_rfc3339());
            }
        }
        None => println!("Not signed in"),
    }
    ExitCode::SUCCESS
}

pub async fn delete_account(app: &App, confirmed: bool) -> ExitCode {
    if !confirmed {
        TerminalNotifier.notify(Notice::error(
            "Deleting your account cannot be undone. Run again with --yes to confirm.",
        ));
        return ExitCode::FAILURE;
    }
    outcome(app.controller.delete_account().await)
}

pub async fn has_role(app: &App, role: &str) -> ExitCode {
    let role: Role = match role.parse() {
        Ok(role) => role,
        Err(e) => {
            TerminalNotifier.notify(Notice::error(AuthError::from(e).user_message()));
            return ExitCode::FAILURE;
        }
    };
    match app.controller.role_membership(role).await {
        Ok(member) => {
            println!("{}", member);
            ExitCode::SUCCESS
        }
        Err(e) => {
            TerminalNotifier.notify(Notice::error(e.user_message()));
            ExitCode::FAILURE
        }
    }
}

pub async fn profile_show(app: &App) -> ExitCode {
    let identity = app.store.current_identity();
    match app.profiles().fetch(identity.as_ref()).await {
        Ok(profile) => {
            let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
            println!("full name: {}", field(&profile.full_name));
            println!("username:  {}", field(&profile.username));
            println!("website:   {}", field(&profile.website));
            println!("location:  {}", field(&profile.location));
            println!("avatar:    {}", field(&profile.avatar_url));
            println!("bio:       {}", field(&profile.bio));
            ExitCode::SUCCESS
        }
        Err(e) => catalog_failure(e),
    }
}

/// Changes to apply on top of the stored profile. `None` keeps a field.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub website: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

pub async fn profile_update(app: &App, changes: ProfileChanges) -> ExitCode {
    let identity = app.store.current_identity();
    let profiles = app.profiles();
    let profile = match profiles.fetch(identity.as_ref()).await {
        Ok(profile) => profile,
        Err(e) => return catalog_failure(e),
    };

    let mut form = ProfileForm::from_profile(&profile);
    let values = form.values_mut();
    for (target, change) in [
        (&mut values.full_name, changes.full_name),
        (&mut values.username, changes.username),
        (&mut values.website, changes.website),
        (&mut values.bio, changes.bio),
        (&mut values.location, changes.location),
    ] {
        if let Some(value) = change {
            *target = value;
        }
    }

    match profiles.update(identity.as_ref(), form.values()).await {
        Ok(_) => {
            success("Profile updated successfully!");
            ExitCode::SUCCESS
        }
        Err(e) => catalog_failure(e),
    }
}

pub async fn profile_avatar(app: &App, path: &Path) -> anyhow::Result<ExitCode> {
    let (file_name, bytes) = read_image(path).await?;
    let identity = app.store.current_identity();
    let profiles = app.profiles();

    let profile = match profiles.fetch(identity.as_ref()).await {
        Ok(profile) => profile,
        Err(e) => return Ok(catalog_failure(e)),
    };
    let url = match profiles
        .upload_avatar(identity.as_ref(), &file_name, bytes)
        .await
    {
        Ok(url) => url,
        Err(e) => return Ok(catalog_failure(e)),
    };

    let mut form = ProfileForm::from_profile(&profile);
    form.apply_avatar(url.clone());
    success("Avatar updated!");

    if let Err(e) = profiles.update(identity.as_ref(), form.values()).await {
        return Ok(catalog_failure(e));
    }
    println!("{}", url);
    Ok(ExitCode::SUCCESS)
}

pub async fn artists_list(app: &App) -> ExitCode {
    match app.artists().list().await {
        Ok(artists) => {
            for artist in artists {
                println!(
                    "{}  {}  {}",
                    artist.id,
                    artist.name,
                    artist.genre.as_deref().unwrap_or("")
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => catalog_failure(e),
    }
}

pub async fn artists_create(app: &App, artist: NewArtist) -> ExitCode {
    let identity = app.store.current_identity();
    match app.artists().create(identity.as_ref(), artist).await {
        Ok(CreateOutcome::Created(artist)) => {
            success("Artist profile created successfully!");
            println!("{}", artist.id);
            ExitCode::SUCCESS
        }
        Ok(CreateOutcome::AlreadyExists { id }) => {
            success("You already have an artist profile");
            println!("{}", id);
            ExitCode::SUCCESS
        }
        Err(e) => catalog_failure(e),
    }
}

pub async fn team_list(app: &App) -> ExitCode {
    match app.team().list().await {
        Ok(members) => {
            for (role, members) in group_by_role(&members) {
                println!("{}", role);
                for member in members {
                    println!("  {}  {}", member.id, member.name);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => catalog_failure(e),
    }
}

pub async fn team_create(app: &App, member: NewTeamMember) -> ExitCode {
    let identity = app.store.current_identity();
    match app.team().create(identity.as_ref(), member).await {
        Ok(CreateOutcome::Created(member)) => {
            success("Team member profile created successfully!");
            println!("{}", member.id);
            ExitCode::SUCCESS
        }
        Ok(CreateOutcome::AlreadyExists { id }) => {
            success("You already have a team member profile");
            println!("{}", id);
            ExitCode::SUCCESS
        }
        Err(e) => catalog_failure(e),
    }
}

pub async fn team_avatar(app: &App, member_id: &str, path: &Path) -> anyhow::Result<ExitCode> {
    let (file_name, bytes) = read_image(path).await?;
    let identity = app.store.current_identity();
    let team = app.team();

    let member = match team.get(member_id).await {
        Ok(member) => member,
        Err(e) => return Ok(catalog_failure(e)),
    };
    match team
        .upload_avatar(identity.as_ref(), &member, &file_name, bytes)
        .await
    {
        Ok(updated) => {
            success("Profile picture updated!");
            println!("{}", updated.avatar_url.unwrap_or_default());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(catalog_failure(e)),
    }
}

/// Mount a guard before the store resolves and print what it decides.
pub async fn guard(app: &App) -> ExitCode {
    let guard = RouteGuard::mount(
        &app.store,
        app.navigator.clone(),
        app.config.login_route.clone(),
    );
    println!("while loading: {:?}", guard.view());

    app.initialize().await;
    let view = guard.view();
    match view {
        GuardView::Protected => println!("protected content rendered"),
        GuardView::Redirecting => println!(
            "redirected to {}",
            app.navigator.last_route().unwrap_or_default()
        ),
        GuardView::Placeholder => println!("still loading"),
    }
    ExitCode::SUCCESS
}
