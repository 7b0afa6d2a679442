use std::io::Write;
use std::process;

use inkpost::{
    config::{self, AuthorizeArgs, Command, Settings},
    domain::entities::{Actor, ContentResource},
    domain::policy::PolicyEvaluator,
    domain::types::Role,
    infra::{error::InfraError, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, debug, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

fn main() {
    if let Err(error) = run() {
        report_error(&error);
        process::exit(1);
    }
}

fn report_error(error: &InfraError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "inkpost failed");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "inkpost failed");
    });
}

fn run() -> Result<(), InfraError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Authorize(args) => run_authorize(&args),
        Command::Settings(_) => run_settings(&settings),
    }
}

#[derive(Serialize)]
struct AuthorizeOutput<'a> {
    action: &'a str,
    resource: &'a ContentResource,
    allowed: bool,
    reason: Option<&'static str>,
}

fn run_authorize(args: &AuthorizeArgs) -> Result<(), InfraError> {
    let actor = args.actor_role.map(|role| Actor::new(Uuid::new_v4(), role));
    let resource = scenario_resource(args, actor.as_ref());

    let decision = PolicyEvaluator::standard().authorize(actor.as_ref(), &resource, args.action);
    debug!(action = args.action.as_str(), %decision, "Evaluated policy");

    print_json(&AuthorizeOutput {
        action: args.action.as_str(),
        resource: &resource,
        allowed: decision.is_allowed(),
        reason: decision.into_result().err().map(|reason| reason.code()),
    })
}

/// Builds the target described by the flags, wiring ownership to `actor`
/// where requested.
fn scenario_resource(args: &AuthorizeArgs, actor: Option<&Actor>) -> ContentResource {
    let owned_by_actor = |flag: bool, role: Option<Role>| match (flag, actor) {
        (true, Some(actor)) => Some((actor.id, actor.role)),
        _ => role.map(|role| (Uuid::new_v4(), role)),
    };

    if args.comment {
        let article_owner = owned_by_actor(args.actor_owns_article, args.article_owner_role);
        let article = ContentResource::article(Uuid::new_v4(), article_owner, !args.unpublished);
        let author = owned_by_actor(args.actor_owns, args.owner_role);
        ContentResource::comment(Uuid::new_v4(), author, &article, None)
    } else {
        let owner = owned_by_actor(args.actor_owns, args.owner_role);
        ContentResource::article(Uuid::new_v4(), owner, !args.unpublished)
    }
}

fn run_settings(settings: &Settings) -> Result<(), InfraError> {
    print_json(settings)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), InfraError> {
    let rendered = serde_json::to_string_pretty(value)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")?;
    Ok(())
}
