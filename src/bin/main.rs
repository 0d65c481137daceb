// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use transit_engine_rs::{
    AvailabilityState, BookingRequest, CapacityConfig, CapacityKind, CargoLeg, DriverId, Engine,
    LegId, LegInput, LegState, NewService, PassengerLeg, PayDetails, RouteId, ServiceId, TicketId,
    TicketStatus, TicketUpdate, UserId,
};

/// Transit Engine - Replay booking command CSV files
///
/// Reads commands from a CSV file, replays them through the capacity
/// engine and outputs the resulting service states to stdout.
#[derive(Parser, Debug)]
#[command(name = "transit-engine-rs")]
#[command(about = "A capacity engine that replays booking command CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with commands
    ///
    /// Expected format: op,id,service,user,kind,max,weight,status,leg,start_min,wait_min
    /// Example: cargo run -- bookings.csv > services.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Also write a ticket report (in issue order) after the service report
    #[arg(long)]
    tickets: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = match replay_commands(BufReader::new(file)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error replaying commands: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_services(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
    if args.tickets {
        if let Err(e) = write_tickets(&engine, std::io::stdout()) {
            eprintln!("Error writing ticket report: {}", e);
            process::exit(1);
        }
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, id, service, user, kind, max, weight, status, leg,
/// start_min, wait_min`. Everything but `op` is optional per command.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    id: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    service: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    user: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    kind: Option<u8>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    max: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    weight: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    status: Option<u8>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    leg: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    start_min: Option<i64>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    wait_min: Option<i64>,
}

#[derive(Debug)]
enum Command {
    RegisterDriver(DriverId),
    RegisterRoute(RouteId),
    RegisterUser(UserId),
    CreateService {
        driver: DriverId,
        start_min: Option<i64>,
        wait_min: Option<i64>,
    },
    ConfigureCapacity {
        service: ServiceId,
        kind: Option<CapacityKind>,
        max: u32,
    },
    Book {
        service: ServiceId,
        user: UserId,
        weight: Option<u32>,
    },
    TicketStatus {
        ticket: TicketId,
        status: TicketStatus,
    },
    LegState {
        ticket: TicketId,
        leg: LegId,
        state: LegState,
    },
    DeleteService(ServiceId),
    DeleteTicket(TicketId),
}

impl CsvRecord {
    /// Converts a CSV record to a command.
    ///
    /// Returns `None` for unknown ops or missing required fields.
    fn into_command(self) -> Option<Command> {
        match self.op.to_lowercase().as_str() {
            "driver" => Some(Command::RegisterDriver(DriverId(self.id?))),
            "route" => Some(Command::RegisterRoute(RouteId(self.id?))),
            "user" => Some(Command::RegisterUser(UserId(self.id?))),
            "service" => Some(Command::CreateService {
                driver: DriverId(self.id?),
                start_min: self.start_min,
                wait_min: self.wait_min,
            }),
            "capacity" => Some(Command::ConfigureCapacity {
                service: ServiceId(self.service?),
                kind: self.kind.and_then(CapacityKind::from_code),
                max: self.max?,
            }),
            "book" => Some(Command::Book {
                service: ServiceId(self.service?),
                user: UserId(self.user?),
                weight: self.weight,
            }),
            "status" => Some(Command::TicketStatus {
                ticket: TicketId(self.id?),
                status: TicketStatus::from_code(self.status?)?,
            }),
            "leg" => Some(Command::LegState {
                ticket: TicketId(self.id?),
                leg: LegId(self.leg?),
                state: LegState::from_code(self.status?)?,
            }),
            "delete_service" => Some(Command::DeleteService(ServiceId(self.service?))),
            "delete_ticket" => Some(Command::DeleteTicket(TicketId(self.id?))),
            _ => None,
        }
    }
}

fn apply(engine: &Engine, command: Command) -> Result<(), transit_engine_rs::EngineError> {
    match command {
        Command::RegisterDriver(id) => {
            engine.register_driver(id);
            // A registered driver starts out available.
            engine.set_driver_state(id, Some(AvailabilityState::Available), None, None)?;
            Ok(())
        }
        Command::RegisterRoute(id) => {
            engine.register_route(id);
            Ok(())
        }
        Command::RegisterUser(id) => {
            engine.register_user(id);
            Ok(())
        }
        Command::CreateService {
            driver,
            start_min,
            wait_min,
        } => {
            engine.create_service(NewService {
                driver,
                start_date: start_min.map(|m| Utc::now() + ChronoDuration::minutes(m)),
                wait_time_min: wait_min.unwrap_or(0),
                ..Default::default()
            })?;
            Ok(())
        }
        Command::ConfigureCapacity { service, kind, max } => engine.configure_capacity(
            service,
            CapacityConfig {
                kind,
                max_count: max,
                price: None,
            },
        ),
        Command::Book {
            service,
            user,
            weight,
        } => {
            let leg = match weight {
                Some(weight_kg) => LegInput::Cargo(CargoLeg { weight_kg }),
                None => LegInput::Passenger(PassengerLeg::default()),
            };
            engine.book_ticket(
                service,
                BookingRequest {
                    user,
                    promo_code: None,
                    legs: vec![leg],
                    payment: PayDetails::default(),
                },
            )?;
            Ok(())
        }
        Command::TicketStatus { ticket, status } => {
            engine.update_ticket_state(
                ticket,
                TicketUpdate {
                    status: Some(status),
                    leg: None,
                },
            )?;
            Ok(())
        }
        Command::LegState { ticket, leg, state } => {
            engine.update_ticket_state(
                ticket,
                TicketUpdate {
                    status: None,
                    leg: Some((leg, state)),
                },
            )?;
            Ok(())
        }
        Command::DeleteService(id) => engine.delete_service(id),
        Command::DeleteTicket(id) => engine.delete_ticket(id),
    }
}

/// Replays commands from a CSV reader.
///
/// Streaming parse so arbitrarily large command files never load fully
/// into memory. Malformed rows and failed commands are logged and skipped;
/// the replay keeps going, matching how a request log replay behaves.
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is
/// invalid. Individual command errors don't stop processing.
pub fn replay_commands<R: Read>(reader: R) -> Result<Engine, csv::Error> {
    let engine = Engine::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let Some(command) = record.into_command() else {
                    tracing::debug!("skipping invalid command record");
                    continue;
                };
                if let Err(e) = apply(&engine, command) {
                    tracing::debug!(error = %e, "skipping failed command");
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed row");
                continue;
            }
        }
    }

    Ok(engine)
}

/// Flat per-service output row.
#[derive(Debug, Serialize)]
struct ServiceRow {
    service: u64,
    kind: u8,
    max: u32,
    available: u32,
    tickets: usize,
}

/// Flat per-ticket output row.
#[derive(Debug, Serialize)]
struct TicketRow {
    ticket: u64,
    service: u64,
    status: u8,
    legs: usize,
}

/// Writes service states as CSV.
///
/// Columns: `service, kind, max, available, tickets`, ordered by service
/// id.
pub fn write_services<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for snapshot in engine.service_snapshots() {
        wtr.serialize(ServiceRow {
            service: snapshot.id.0,
            kind: snapshot.ledger.kind().code(),
            max: snapshot.ledger.max_count(),
            available: snapshot.ledger.available_count(),
            tickets: snapshot.tickets.len(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes tickets as CSV in issue order.
///
/// Columns: `ticket, service, status, legs`. Consumes the engine's issue
/// log, so call at most once per run.
pub fn write_tickets<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for ticket_id in engine.drain_issue_order() {
        // Skip tickets that raced away between drain and snapshot.
        let Ok(snapshot) = engine.ticket_snapshot(ticket_id) else {
            continue;
        };
        wtr.serialize(TicketRow {
            ticket: snapshot.ticket.id.0,
            service: snapshot.service.0,
            status: snapshot.ticket.status.code(),
            legs: snapshot.ticket.legs.len(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "op,id,service,user,kind,max,weight,status,leg,start_min,wait_min\n";

    fn replay(rows: &str) -> Engine {
        let csv = format!("{HEADER}{rows}");
        replay_commands(Cursor::new(csv)).unwrap()
    }

    #[test]
    fn parse_passenger_booking_flow() {
        let engine = replay(
            "driver,1,,,,,,,,,\n\
             user,1,,,,,,,,,\n\
             service,1,,,,,,,,,\n\
             capacity,,1,,1,4,,,,,\n\
             book,,1,1,,,,,,,\n",
        );
        let snapshot = engine.service_snapshot(ServiceId(1)).unwrap();
        assert_eq!(snapshot.ledger.available_count(), 3);
        assert_eq!(snapshot.tickets.len(), 1);
    }

    #[test]
    fn parse_cargo_booking_and_cancel() {
        let engine = replay(
            "driver,1,,,,,,,,,\n\
             user,1,,,,,,,,,\n\
             service,1,,,,,,,,,\n\
             capacity,,1,,2,1000,,,,,\n\
             book,,1,1,,,200,,,,\n\
             leg,1,,,,,,3,1,,\n",
        );
        let snapshot = engine.service_snapshot(ServiceId(1)).unwrap();
        assert_eq!(snapshot.ledger.available_count(), 1000);
    }

    #[test]
    fn ticket_status_cancel_reclaims() {
        let engine = replay(
            "driver,1,,,,,,,,,\n\
             user,1,,,,,,,,,\n\
             service,1,,,,,,,,,\n\
             capacity,,1,,1,4,,,,,\n\
             book,,1,1,,,,,,,\n\
             status,1,,,,,,3,,,\n",
        );
        let snapshot = engine.service_snapshot(ServiceId(1)).unwrap();
        assert_eq!(snapshot.ledger.available_count(), 4);
        assert_eq!(snapshot.tickets[0].status, TicketStatus::Cancelled);
    }

    #[test]
    fn skip_malformed_and_failed_rows() {
        let engine = replay(
            "driver,1,,,,,,,,,\n\
             user,1,,,,,,,,,\n\
             nonsense,row,,,,,,,,,\n\
             service,99,,,,,,,,,\n\
             service,1,,,,,,,,,\n",
        );
        // Unknown driver 99 is skipped; only one service exists.
        assert_eq!(engine.service_snapshots().len(), 1);
    }

    #[test]
    fn write_services_to_csv() {
        let engine = replay(
            "driver,1,,,,,,,,,\n\
             user,1,,,,,,,,,\n\
             service,1,,,,,,,,,\n\
             capacity,,1,,1,4,,,,,\n\
             book,,1,1,,,,,,,\n",
        );
        let mut output = Vec::new();
        write_services(&engine, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("service,kind,max,available,tickets"));
        assert!(output.contains("1,1,4,3,1"));
    }

    #[test]
    fn write_tickets_in_issue_order() {
        let engine = replay(
            "driver,1,,,,,,,,,\n\
             user,1,,,,,,,,,\n\
             service,1,,,,,,,,,\n\
             capacity,,1,,1,4,,,,,\n\
             book,,1,1,,,,,,,\n\
             book,,1,1,,,,,,,\n",
        );
        let mut output = Vec::new();
        write_tickets(&engine, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("ticket,service,status,legs"));
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[1].starts_with("1,1,"));
        assert!(lines[2].starts_with("2,1,"));
    }
}
