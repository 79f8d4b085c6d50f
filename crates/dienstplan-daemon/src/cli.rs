use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dienstplan_calendar::{parse_date, TimeRange};
use dienstplan_core::{NotificationPrefs, User, UserRole};
use dienstplan_users::{Permission, PermissionChecker, SqliteUserDirectory};
use serde::Serialize;
use serde_json::Value;

use crate::app::App;

/// Volunteer duty roster: bookings, reminders and the operator console.
#[derive(Parser, Debug)]
#[command(name = "dienstplan")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the reminder scheduler until Ctrl-C
    Run,
    #[command(flatten)]
    Operator(OperatorCommand),
}

/// One-shot commands that print a JSON result and exit.
#[derive(Subcommand, Debug)]
pub enum OperatorCommand {
    /// Register a volunteer or admin
    AddUser {
        email: String,
        name: String,
        /// Phone number for SMS notices
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long)]
        admin: bool,
        #[arg(long = "as")]
        actor: Option<String>,
    },
    /// Inspect and administer accounts (admins only)
    User {
        #[command(subcommand)]
        action: UserCommand,
        /// Acting user (defaults to the configured admin)
        #[arg(long = "as", global = true)]
        actor: Option<String>,
    },
    /// Book a slot
    Book {
        /// Slot date (YYYY-MM-DD)
        #[arg(value_parser = date_arg)]
        date: NaiveDate,
        /// Slot time (HH:MM-HH:MM)
        #[arg(value_parser = time_arg)]
        time: TimeRange,
        /// Book for this user instead of the actor
        #[arg(long = "for")]
        for_user: Option<String>,
        /// Acting user (defaults to the configured admin)
        #[arg(long = "as")]
        actor: Option<String>,
    },
    /// Cancel a booking
    Cancel {
        booking_id: String,
        #[arg(long = "as")]
        actor: Option<String>,
    },
    /// Hand a booking to another user
    Rebook {
        booking_id: String,
        new_user: String,
        #[arg(long = "as")]
        actor: Option<String>,
    },
    /// Replace a booking with one for another user
    Override {
        booking_id: String,
        new_user: String,
        #[arg(long = "as")]
        actor: Option<String>,
    },
    /// List open slots
    FreeSlots {
        /// First day to consider (defaults to today)
        #[arg(long, value_parser = date_arg)]
        from: Option<NaiveDate>,
        #[arg(long, default_value = "28")]
        days: u32,
    },
    /// Show the slots of the week containing a date
    Week {
        #[arg(value_parser = date_arg)]
        date: Option<NaiveDate>,
    },
    /// Dashboard numbers
    Stats,
    /// Recent audit log entries
    Audit {
        #[arg(short, long, default_value = "50")]
        limit: usize,
        #[arg(long = "as")]
        actor: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Every account, deactivated ones included
    List,
    Show { email: String },
    /// Allow the account to book again
    Activate { email: String },
    /// Keep the account's bookings but stop new ones
    Deactivate { email: String },
    /// Change the role (user or admin)
    Role { email: String, role: UserRole },
    /// Switch notification preferences; unset flags stay as they are
    Prefs {
        email: String,
        #[arg(long)]
        email_notifications: Option<bool>,
        #[arg(long)]
        email_on_booking: Option<bool>,
        #[arg(long = "email-24h")]
        email_24h: Option<bool>,
        #[arg(long = "email-1h")]
        email_1h: Option<bool>,
        #[arg(long)]
        sms_notifications: Option<bool>,
        #[arg(long)]
        sms_on_booking: Option<bool>,
        #[arg(long = "sms-24h")]
        sms_24h: Option<bool>,
        #[arg(long = "sms-1h")]
        sms_1h: Option<bool>,
    },
}

/// Execute an operator subcommand and print its result as JSON.
pub async fn execute(app: &App, command: OperatorCommand) -> anyhow::Result<()> {
    match command {
        OperatorCommand::AddUser {
            email,
            name,
            phone,
            admin,
            actor,
        } => {
            let actor = app.actor(actor.as_deref())?;
            PermissionChecker::require(&actor, Permission::ManageUsers)?;
            let role = if admin { UserRole::Admin } else { UserRole::User };
            let user = User::new(&email, &name, &phone, role)?;
            print_json(&app.users.create_user(&user)?)
        }
        OperatorCommand::User { action, actor } => {
            let actor = app.actor(actor.as_deref())?;
            print_json(&manage_users(&app.users, &actor, action)?)
        }
        OperatorCommand::Book {
            date,
            time,
            for_user,
            actor,
        } => {
            let actor = app.actor(actor.as_deref())?;
            let target = match for_user {
                Some(email) => app.user(&email)?,
                None => actor.clone(),
            };
            print_json(&app.engine.book_and_notify(&actor, &target, date, time).await?)
        }
        OperatorCommand::Cancel { booking_id, actor } => {
            let actor = app.actor(actor.as_deref())?;
            print_json(&app.engine.cancel_and_notify(&actor, &booking_id).await?)
        }
        OperatorCommand::Rebook {
            booking_id,
            new_user,
            actor,
        } => {
            let actor = app.actor(actor.as_deref())?;
            let new_user = app.user(&new_user)?;
            print_json(&app.engine.rebook(&actor, &booking_id, &new_user)?)
        }
        OperatorCommand::Override {
            booking_id,
            new_user,
            actor,
        } => {
            let actor = app.actor(actor.as_deref())?;
            let new_user = app.user(&new_user)?;
            print_json(&app.engine.override_booking(&actor, &booking_id, &new_user)?)
        }
        OperatorCommand::FreeSlots { from, days } => {
            let from = from.unwrap_or_else(|| app.clock.today());
            print_json(&app.engine.free_slots(from, days)?)
        }
        OperatorCommand::Week { date } => {
            let date = date.unwrap_or_else(|| app.clock.today());
            print_json(&app.engine.week_overview(date)?)
        }
        OperatorCommand::Stats => print_json(&app.engine.stats(app.clock.today())),
        OperatorCommand::Audit { limit, actor } => {
            let actor = app.actor(actor.as_deref())?;
            print_json(&app.engine.audit_log(&actor, limit)?)
        }
    }
}

/// Apply a user-admin action on behalf of `actor`, who needs `ManageUsers`.
fn manage_users(
    users: &SqliteUserDirectory,
    actor: &User,
    action: UserCommand,
) -> anyhow::Result<Value> {
    PermissionChecker::require(actor, Permission::ManageUsers)?;
    let email = match action {
        UserCommand::List => return Ok(serde_json::to_value(users.list_users()?)?),
        UserCommand::Show { email } => email,
        UserCommand::Activate { email } => {
            users.set_active(&email, true)?;
            email
        }
        UserCommand::Deactivate { email } => {
            users.set_active(&email, false)?;
            email
        }
        UserCommand::Role { email, role } => {
            users.set_role(&email, role)?;
            email
        }
        UserCommand::Prefs {
            email,
            email_notifications,
            email_on_booking,
            email_24h,
            email_1h,
            sms_notifications,
            sms_on_booking,
            sms_24h,
            sms_1h,
        } => {
            let current = find(users, &email)?.prefs;
            let prefs = NotificationPrefs {
                email_notifications: email_notifications.unwrap_or(current.email_notifications),
                email_on_booking: email_on_booking.unwrap_or(current.email_on_booking),
                email_24h: email_24h.unwrap_or(current.email_24h),
                email_1h: email_1h.unwrap_or(current.email_1h),
                sms_notifications: sms_notifications.unwrap_or(current.sms_notifications),
                sms_on_booking: sms_on_booking.unwrap_or(current.sms_on_booking),
                sms_24h: sms_24h.unwrap_or(current.sms_24h),
                sms_1h: sms_1h.unwrap_or(current.sms_1h),
            };
            users.update_prefs(&email, &prefs)?;
            email
        }
    };
    Ok(serde_json::to_value(find(users, &email)?)?)
}

fn find(users: &SqliteUserDirectory, email: &str) -> anyhow::Result<User> {
    users
        .find(email)?
        .with_context(|| format!("unknown user {email}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map_err(|e| e.to_string())
}

fn time_arg(s: &str) -> Result<TimeRange, String> {
    s.parse::<TimeRange>().map_err(|e| e.to_string())
}
