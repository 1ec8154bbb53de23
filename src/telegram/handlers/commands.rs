//! Command handler implementations (/start, /help, /generate, /session)

use super::types::{CommandContext, CommandOutcome};
use crate::session::{merge, SessionRecord};
use crate::telegram::bot::Command;
use crate::telegram::format;

/// Routes a parsed command to its handler
///
/// Privileged commands are rejected here for anyone but the owner, before
/// their handler can touch the session or the upstream service.
pub async fn handle_command(ctx: &CommandContext<'_>, command: Command, session: &mut SessionRecord) -> CommandOutcome {
    if command.is_privileged() && !ctx.is_owner() {
        tracing::info!(user_id = ctx.user_id.0, ?command, "Privileged command denied");
        ctx.deps.reply_text(ctx.chat_id, format::ACCESS_DENIED).await;
        return CommandOutcome::Denied;
    }

    match command {
        Command::Start => handle_start(ctx).await,
        Command::Help => {
            ctx.deps.reply_text(ctx.chat_id, &format::help()).await;
            CommandOutcome::Replied
        }
        Command::Generate => handle_generate(ctx, session).await,
        Command::Session => handle_session(ctx, session).await,
    }
}

/// Handle /start command
async fn handle_start(ctx: &CommandContext<'_>) -> CommandOutcome {
    ctx.deps.reply_text(ctx.chat_id, format::WELCOME).await;
    CommandOutcome::Replied
}

/// Handle /generate (and legacy /deno)
///
/// Calls the upstream service once. On success the result is merged into
/// `session` and summarized; on any failure the session is left as it was.
/// Only reachable through [`handle_command`], which has already checked the owner.
async fn handle_generate(ctx: &CommandContext<'_>, session: &mut SessionRecord) -> CommandOutcome {
    ctx.deps.reply_text(ctx.chat_id, format::IN_PROGRESS).await;

    let user_id = ctx.user_id.0.to_string();
    match ctx.deps.upstream.generate(&user_id).await {
        Ok(result) => {
            *session = merge(session, &result, ctx.now);
            tracing::info!(
                user_id = %user_id,
                orgs = session.organizations.len(),
                dev_urls = session.dev_urls.len(),
                "Generate succeeded"
            );
            ctx.deps
                .reply_html(ctx.chat_id, &format::generate_summary(&result, ctx.now))
                .await;
            CommandOutcome::Generated
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Generate failed");
            ctx.deps.reply_text(ctx.chat_id, format::GENERATE_FAILED).await;
            CommandOutcome::UpstreamFailed
        }
    }
}

/// Handle /session: shows what is stored, changes nothing
async fn handle_session(ctx: &CommandContext<'_>, session: &SessionRecord) -> CommandOutcome {
    ctx.deps
        .reply_html(ctx.chat_id, &format::session_view(session, ctx.now))
        .await;
    CommandOutcome::Replied
}
