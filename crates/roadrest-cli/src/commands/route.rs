use std::time::Duration;

use chrono::Local;
use clap::Subcommand;

use roadrest_core::providers::LocationProvider;
use roadrest_core::SchedulerPhase;

use crate::common::{self, CliError, Context};
use crate::location::EnvLocation;
use crate::state;

#[derive(Subcommand)]
pub enum RouteAction {
    /// Plan a new route and make it the active trip
    Create {
        /// Route name
        #[arg(long)]
        name: String,
        /// Start coordinate as lat,lon (defaults to the device location)
        #[arg(long)]
        from: Option<String>,
        /// Destination coordinate as lat,lon
        #[arg(long)]
        to: String,
        /// Intermediate waypoints as lat,lon (repeatable)
        #[arg(long = "via")]
        via: Vec<String>,
    },
    /// List recent routes
    List,
    /// Make a route the active trip
    Activate {
        /// Route id, id prefix or name
        route: String,
    },
    /// Clear the active trip
    Clear,
    /// Delete a route
    Delete {
        route: String,
    },
    /// Toggle the favorite flag
    Favorite {
        route: String,
    },
}

pub async fn run(action: RouteAction) -> Result<(), CliError> {
    let ctx = common::context().await?;
    match action {
        RouteAction::Create { name, from, to, via } => {
            common::require_user(&ctx).await?;
            let start = match from {
                Some(raw) => common::parse_geo(&raw)?,
                None => EnvLocation.current_location().await?,
            };
            let end = common::parse_geo(&to)?;
            let waypoints = via
                .iter()
                .map(|raw| common::parse_geo(raw))
                .collect::<Result<Vec<_>, _>>()?;

            let route = ctx
                .session
                .routes
                .create_route(&name, start, end, waypoints)
                .await?;
            println!(
                "created route {} '{}': {}, about {}",
                common::short_id(&route.id),
                route.name,
                common::format_distance(route.distance_m),
                common::format_duration(route.estimated_duration_secs),
            );
            state::set_active_route_id(Some(&route.id))?;
            print_schedule_when_ready(&ctx).await;
        }
        RouteAction::List => {
            common::require_user(&ctx).await?;
            let routes = ctx.session.routes.load_routes().await?;
            if routes.is_empty() {
                println!("no routes yet (try `roadrest route create`)");
                return Ok(());
            }
            for route in routes {
                println!(
                    "{} {} '{}' {} {} ({})",
                    common::short_id(&route.id),
                    if route.favorite { "*" } else { " " },
                    route.name,
                    common::format_distance(route.distance_m),
                    common::format_duration(route.estimated_duration_secs),
                    route.created_at.with_timezone(&Local).format("%Y-%m-%d"),
                );
            }
        }
        RouteAction::Activate { route } => {
            common::require_user(&ctx).await?;
            let routes = ctx.session.routes.load_routes().await?;
            let route = common::find_route(&routes, &route)?;
            state::set_active_route_id(Some(&route.id))?;
            println!("active trip: '{}'", route.name);
            ctx.session.routes.set_active_route(route);
            print_schedule_when_ready(&ctx).await;
        }
        RouteAction::Clear => {
            ctx.session.routes.clear_active_route();
            state::set_active_route_id(None)?;
            println!("active trip cleared");
        }
        RouteAction::Delete { route } => {
            common::require_user(&ctx).await?;
            let routes = ctx.session.routes.load_routes().await?;
            let route = common::find_route(&routes, &route)?;
            ctx.session.routes.delete_route(&route).await?;
            if state::active_route_id().as_deref() == Some(route.id.as_str()) {
                state::set_active_route_id(None)?;
            }
            println!("deleted '{}'", route.name);
        }
        RouteAction::Favorite { route } => {
            common::require_user(&ctx).await?;
            let routes = ctx.session.routes.load_routes().await?;
            let route = common::find_route(&routes, &route)?;
            let updated = ctx.session.routes.toggle_favorite(&route).await;
            println!(
                "'{}' is {}a favorite",
                updated.name,
                if updated.favorite { "" } else { "no longer " }
            );
        }
    }
    Ok(())
}

/// Wait for the scheduler to settle, then print the derived breaks.
async fn print_schedule_when_ready(ctx: &Context) {
    for _ in 0..100 {
        if ctx.session.breaks.phase().get() == SchedulerPhase::Monitoring {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let points = ctx.session.breaks.scheduled_breaks().get();
    if points.is_empty() {
        println!("no breaks needed for this trip");
        return;
    }
    println!("{} break(s) scheduled:", points.len());
    for point in points {
        println!(
            "  {} at {}",
            common::short_id(&point.id),
            point.scheduled_time.with_timezone(&Local).format("%H:%M"),
        );
    }
}
