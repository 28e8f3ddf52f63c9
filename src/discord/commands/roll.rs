// Dice roll command, rate limited per user and per channel.

use crate::core::cooldown::CommandGate;
use crate::discord::{Data, Error};
use rand::Rng;

type Context<'a> = poise::Context<'a, Data, Error>;

/// Roll 2d6.
#[poise::command(slash_command, rename = "r", guild_only)]
pub async fn roll(ctx: Context<'_>) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let channel_id = ctx.channel_id().get();
    let now = chrono::Utc::now().timestamp_millis();

    // Both the per-user and the per-channel cooldown must be clear.
    match ctx.data().roll_cooldowns.try_acquire(user_id, channel_id, now) {
        CommandGate::CoolingDown { retry_after_secs } => {
            ctx.send(
                poise::CreateReply::default()
                    .content(format!("⏳ Slow down! Try again in {}s.", retry_after_secs))
                    .ephemeral(true),
            )
            .await?;
        }
        CommandGate::Ready => {
            let (d1, d2): (u32, u32) = {
                let mut rng = rand::thread_rng();
                (rng.gen_range(1..=6), rng.gen_range(1..=6))
            };
            let total = d1 + d2;

            ctx.say(format!("🎲 2d6: {} + {} = **{}**", d1, d2, total))
                .await?;

            tracing::info!(
                event = "roll_2d6",
                user_id,
                channel_id,
                d1,
                d2,
                total,
                "rolled 2d6"
            );
        }
    }

    Ok(())
}
