use chrono::Local;
use clap::Subcommand;

use roadrest_core::BreakPoint;

use crate::common::{self, CliError, Context};

#[derive(Subcommand)]
pub enum BreaksAction {
    /// Show the break schedule for a route
    List {
        /// Route id, id prefix or name
        route: String,
    },
    /// Mark a break point completed
    Complete {
        route: String,
        /// Break point id or id prefix
        point: String,
    },
    /// Search points of interest near a break
    Pois {
        route: String,
        point: String,
    },
}

pub async fn run(action: BreaksAction) -> Result<(), CliError> {
    let ctx = common::context().await?;
    match action {
        BreaksAction::List { route } => {
            let points = load_points(&ctx, &route).await?;
            if points.is_empty() {
                println!("no breaks scheduled for this route");
                return Ok(());
            }
            for (index, point) in points.iter().enumerate() {
                let poi = point
                    .poi
                    .as_ref()
                    .map(|p| format!(" @ {}", p.name))
                    .unwrap_or_default();
                println!(
                    "{:>2}. {} {} at {}{}{}",
                    index + 1,
                    common::short_id(&point.id),
                    if point.completed { "[done]" } else { "      " },
                    point.scheduled_time.with_timezone(&Local).format("%H:%M"),
                    poi,
                    point
                        .notes
                        .as_ref()
                        .map(|n| format!("  ({n})"))
                        .unwrap_or_default(),
                );
            }
        }
        BreaksAction::Complete { route, point } => {
            let points = load_points(&ctx, &route).await?;
            let point = find_point(&points, &point)?;
            ctx.session.breaks.complete_break(&point).await?;
            println!("break {} completed", common::short_id(&point.id));
        }
        BreaksAction::Pois { route, point } => {
            let user = common::require_user(&ctx).await?;
            let points = load_points(&ctx, &route).await?;
            let point = find_point(&points, &point)?;
            let pois = ctx
                .session
                .breaks
                .find_nearby_pois(&point, &user.preferences.poi.preferred_categories)
                .await?;
            if pois.is_empty() {
                println!("nothing found near this break");
                return Ok(());
            }
            for poi in pois {
                let address = if poi.address.is_empty() {
                    String::new()
                } else {
                    format!(" -- {}", poi.address)
                };
                println!("{:?}: {}{}", poi.category, poi.name, address);
            }
        }
    }
    Ok(())
}

async fn load_points(ctx: &Context, route: &str) -> Result<Vec<BreakPoint>, CliError> {
    common::require_user(ctx).await?;
    let routes = ctx.session.routes.load_routes().await?;
    let route = common::find_route(&routes, route)?;
    ctx.session.breaks.load_schedule(&route.id).await?;
    Ok(ctx.session.breaks.scheduled_breaks().get())
}

fn find_point(points: &[BreakPoint], needle: &str) -> Result<BreakPoint, CliError> {
    points
        .iter()
        .find(|p| p.id == needle || p.id.starts_with(needle))
        .cloned()
        .ok_or_else(|| format!("no break point matching '{needle}'").into())
}
