use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::{Build, Rocket};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use std::error::Error;
use std::sync::{Arc, Mutex};

mod config;
mod data;
mod goals;
mod internal_error;
mod session;
mod tasks;


use config::AppConfig;
use goals::tree::TreeViews;
use tasks::events::TaskEvents;

#[macro_use]
extern crate rocket;

fn app_config(rocket: &Rocket<Build>) -> AppConfig {
    rocket
        .state::<AppConfig>()
        .cloned()
        .unwrap_or_default()
}

pub fn build_rocket(figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(AdHoc::config::<AppConfig>())
        .attach(AdHoc::try_on_ignite("SQLite database", |rocket| async move {
            let path = app_config(&rocket).database;
            match data::open_database(&path) {
                Ok(connection) => {
                    info!(database = %path, "Opened database");
                    Ok(rocket.manage(Arc::new(Mutex::new(connection)) as data::DBConnection))
                }
                Err(e) => {
                    error!(database = %path, "Failed to open database: {}", e);
                    Err(rocket)
                }
            }
        }))
        .attach(AdHoc::on_ignite("Task change feed", |rocket| async move {
            let capacity = app_config(&rocket).event_capacity;
            rocket.manage(TaskEvents::new(capacity))
        }))
        .manage(TreeViews::default())
        .mount(
            "/api",
            routes![
                goals::endpoints::get_goals,
                goals::endpoints::add_goal,
                goals::endpoints::set_goal,
                goals::endpoints::get_goal_tree,
                goals::endpoints::create_root_node,
                goals::endpoints::add_subgoal,
                goals::endpoints::toggle_goal_node,
                goals::endpoints::set_goal_node,
                goals::endpoints::set_goal_node_progress,
                tasks::endpoints::get_tasks,
                tasks::endpoints::get_active_tasks,
                tasks::endpoints::get_weekly_summary,
                tasks::endpoints::get_week_schedule,
                tasks::endpoints::get_next_week_schedule,
                tasks::endpoints::get_month_schedule,
                tasks::endpoints::get_yearly_analytics,
                tasks::endpoints::add_task,
                tasks::endpoints::quick_add_task,
                tasks::endpoints::set_task,
                tasks::endpoints::start_task,
                tasks::endpoints::pause_task,
                tasks::endpoints::restart_task,
                tasks::endpoints::complete_task,
                tasks::endpoints::delete_task,
                tasks::endpoints::task_events,
                tasks::endpoints::task_countdown,
            ],
        )
        .register("/", catchers![internal_error::default_catcher])
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    build_rocket(rocket::Config::figment()).launch().await?;

    Ok(())
}
