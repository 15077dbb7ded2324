//! Record command - renovation records, rooms and tags

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use dialoguer::Confirm;
use renohub_core::services::RecordQuery;
use renohub_core::validation::{LocationForm, RecordForm};

use super::{acting_user, get_context, log_command, parse_id};
use crate::output;

#[derive(Args)]
pub struct LocationArgs {
    #[arg(long)]
    street: String,
    #[arg(long)]
    suburb: Option<String>,
    #[arg(long)]
    city: String,
    #[arg(long)]
    postcode: Option<String>,
    #[arg(long, default_value = "New Zealand")]
    country: String,
}

impl From<LocationArgs> for LocationForm {
    fn from(args: LocationArgs) -> Self {
        LocationForm {
            street_address: args.street,
            suburb: args.suburb.unwrap_or_default(),
            city: args.city,
            postcode: args.postcode.unwrap_or_default(),
            country: args.country,
        }
    }
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// Create a renovation record
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[command(flatten)]
        location: LocationArgs,
        /// Make the record visible to everyone
        #[arg(long)]
        public: bool,
    },
    /// List your records, or public records matching a query
    List {
        /// Browse public records instead of your own
        #[arg(long)]
        public: bool,
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long, default_value = "1")]
        page: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a record with its rooms and tags
    Show {
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a record and everything in it
    Delete {
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
    /// Make a record public or private
    Publish {
        id: String,
        /// Hide the record again
        #[arg(long)]
        private: bool,
    },
    /// Add a tag to a record, or remove it
    Tag {
        id: String,
        tag: String,
        #[arg(long)]
        remove: bool,
    },
    /// Add a room to a record, or remove one by its id
    Room {
        id: String,
        /// Room name to add, or room id with --remove
        room: String,
        #[arg(long)]
        remove: bool,
    },
    /// Suggest addresses for a partial street address
    Address {
        query: String,
        /// City to search within
        #[arg(long)]
        city: Option<String>,
    },
}

pub fn run(command: RecordCommands, acting_as: Option<&str>) -> Result<()> {
    let ctx = get_context()?;

    match command {
        RecordCommands::Create {
            name,
            description,
            location,
            public,
        } => {
            log_command(&ctx, "record create");
            let user = acting_user(&ctx, acting_as)?;
            let form = RecordForm {
                name,
                description,
                location: location.into(),
            };
            let mut record = ctx.record_service.create_record(user.id, &form)?;
            if public {
                record = ctx.record_service.set_public(user.id, record.id, true)?;
            }
            output::success(&format!("Created '{}' ({})", record.name, record.id));
        }
        RecordCommands::List {
            public,
            keyword,
            tag,
            city,
            page,
            json,
        } => {
            let records = if public {
                let query = RecordQuery { keyword, tag, city };
                ctx.record_service.search_public_records(&query, page)?
            } else {
                let user = acting_user(&ctx, acting_as)?;
                ctx.record_service.list_records(user.id, page)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }
            if records.items.is_empty() {
                println!("No renovation records found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["ID", "Name", "Location", "Public"]);
            for record in &records.items {
                table.add_row(vec![
                    record.id.to_string(),
                    record.name.clone(),
                    record.location.display_line(),
                    if record.is_public { "yes" } else { "no" }.to_string(),
                ]);
            }
            println!("{}", table);
            output::page_footer(&records);
        }
        RecordCommands::Show { id, json } => {
            let viewer = match acting_as {
                Some(_) => Some(acting_user(&ctx, acting_as)?.id),
                None => None,
            };
            let details = ctx.record_service.get_record(viewer, parse_id(&id)?)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&details)?);
                return Ok(());
            }

            let record = &details.record;
            println!("{}", record.name.bold());
            println!("{}", record.description);
            println!("{}", record.location.display_line().dimmed());
            println!();

            let tags: Vec<&str> = details.tags.iter().map(|t| t.name.as_str()).collect();
            println!("Tags: {}", if tags.is_empty() { "-".to_string() } else { tags.join(", ") });

            if details.rooms.is_empty() {
                println!("Rooms: -");
            } else {
                let mut table = output::create_table();
                table.set_header(vec!["Room ID", "Room", "Image"]);
                for room in &details.rooms {
                    table.add_row(vec![
                        room.id.to_string(),
                        room.name.clone(),
                        output::or_dash(room.image.as_ref()),
                    ]);
                }
                println!("{}", table);
            }
        }
        RecordCommands::Delete { id, force } => {
            log_command(&ctx, "record delete");
            let user = acting_user(&ctx, acting_as)?;
            let id = parse_id(&id)?;

            if !force {
                output::warning("This deletes the record with its rooms, jobs, quotes and expenses.");
                if !Confirm::new()
                    .with_prompt("Are you sure?")
                    .default(false)
                    .interact()?
                {
                    println!("{}", "Cancelled".dimmed());
                    return Ok(());
                }
            }

            ctx.record_service.delete_record(user.id, id)?;
            output::success("Renovation record deleted");
        }
        RecordCommands::Publish { id, private } => {
            log_command(&ctx, "record publish");
            let user = acting_user(&ctx, acting_as)?;
            let record = ctx.record_service.set_public(user.id, parse_id(&id)?, !private)?;
            let state = if record.is_public { "public" } else { "private" };
            output::success(&format!("'{}' is now {}", record.name, state));
        }
        RecordCommands::Tag { id, tag, remove } => {
            log_command(&ctx, "record tag");
            let user = acting_user(&ctx, acting_as)?;
            let id = parse_id(&id)?;
            if remove {
                ctx.record_service.remove_tag(user.id, id, &tag)?;
                output::success(&format!("Removed tag '{}'", tag.trim()));
            } else {
                let tag = ctx.record_service.add_tag(user.id, id, &tag)?;
                output::success(&format!("Added tag '{}'", tag.name));
            }
        }
        RecordCommands::Room { id, room, remove } => {
            log_command(&ctx, "record room");
            let user = acting_user(&ctx, acting_as)?;
            if remove {
                ctx.record_service.remove_room(user.id, parse_id(&room)?)?;
                output::success("Room removed");
            } else {
                let room = ctx.record_service.add_room(user.id, parse_id(&id)?, &room)?;
                output::success(&format!("Added room '{}' ({})", room.name, room.id));
            }
        }
        RecordCommands::Address { query, city } => {
            let suggestions = ctx.location_service.autocomplete(&query, city.as_deref())?;
            if suggestions.is_empty() {
                println!("No suggestions.");
                return Ok(());
            }
            for suggestion in suggestions {
                println!("{}", suggestion.display_name);
            }
        }
    }

    Ok(())
}
