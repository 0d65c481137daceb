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

//! Benchmarks for the capacity engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded booking and cancellation
//! - Multi-threaded booking on one service vs. across services
//! - Lock contention as bookings concentrate on fewer services
//! - Scaling with thread count

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rayon::prelude::*;
use std::sync::Arc;
use transit_engine_rs::{
    BookingRequest, CapacityConfig, CapacityKind, DriverId, Engine, LegInput, PassengerLeg,
    PayDetails, ServiceId, TicketStatus, TicketUpdate, UserId,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn booking(user: u64) -> BookingRequest {
    BookingRequest {
        user: UserId(user),
        promo_code: None,
        legs: vec![LegInput::Passenger(PassengerLeg::default())],
        payment: PayDetails::default(),
    }
}

fn cancel() -> TicketUpdate {
    TicketUpdate {
        status: Some(TicketStatus::Cancelled),
        leg: None,
    }
}

/// Engine with one driver, `users` users and `services` passenger
/// services of `seats` seats each.
fn setup(users: u64, services: usize, seats: u32) -> (Arc<Engine>, Vec<ServiceId>) {
    let engine = Arc::new(Engine::new());
    engine.register_driver(DriverId(1));
    for u in 1..=users {
        engine.register_user(UserId(u));
    }
    let ids = (0..services)
        .map(|_| {
            let service = engine
                .create_service(transit_engine_rs::NewService {
                    driver: DriverId(1),
                    ..Default::default()
                })
                .unwrap();
            engine
                .configure_capacity(
                    service,
                    CapacityConfig {
                        kind: Some(CapacityKind::Passenger),
                        max_count: seats,
                        price: None,
                    },
                )
                .unwrap();
            service
        })
        .collect();
    (engine, ids)
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_booking(c: &mut Criterion) {
    c.bench_function("single_booking", |b| {
        b.iter(|| {
            let (engine, services) = setup(1, 1, 4);
            engine
                .book_ticket(services[0], black_box(booking(1)))
                .unwrap();
        })
    });
}

fn bench_book_then_cancel(c: &mut Criterion) {
    c.bench_function("book_then_cancel", |b| {
        b.iter(|| {
            let (engine, services) = setup(1, 1, 4);
            let ticket = engine.book_ticket(services[0], booking(1)).unwrap();
            engine
                .update_ticket_state(ticket, black_box(cancel()))
                .unwrap();
        })
    });
}

fn bench_booking_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("booking_throughput");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let (engine, services) = setup(1, 1, count as u32);
                for _ in 0..count {
                    engine.book_ticket(services[0], booking(1)).unwrap();
                }
                black_box(&engine);
            })
        });
    }
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");

    // Book and cancel in lockstep: the ledger stays near full, the
    // ticket table keeps growing.
    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64 * 2));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let (engine, services) = setup(1, 1, 4);
                for _ in 0..count {
                    let ticket = engine.book_ticket(services[0], booking(1)).unwrap();
                    engine.update_ticket_state(ticket, cancel()).unwrap();
                }
                black_box(&engine);
            })
        });
    }
    group.finish();
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_parallel_bookings_one_service(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_bookings_one_service");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let (engine, services) = setup(1, 1, count as u32);
                (0..count).into_par_iter().for_each(|_| {
                    engine.book_ticket(services[0], booking(1)).unwrap();
                });
                black_box(&engine);
            })
        });
    }
    group.finish();
}

fn bench_parallel_bookings_across_services(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_bookings_across_services");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                const NUM_SERVICES: usize = 100;
                let (engine, services) =
                    setup(1, NUM_SERVICES, count as u32 / NUM_SERVICES as u32 + 1);
                (0..count).into_par_iter().for_each(|i| {
                    let service = services[i % NUM_SERVICES];
                    let _ = engine.book_ticket(service, booking(1));
                });
                black_box(&engine);
            })
        });
    }
    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    let total_ops = 10_000usize;

    // Fewer services = more threads competing for the same aggregate lock.
    for num_services in [1, 10, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(total_ops as u64));
        group.bench_with_input(
            BenchmarkId::new("services", num_services),
            num_services,
            |b, &num_services| {
                b.iter(|| {
                    let (engine, services) = setup(
                        1,
                        num_services,
                        (total_ops / num_services) as u32 + 1,
                    );
                    (0..total_ops).into_par_iter().for_each(|i| {
                        let service = services[i % num_services];
                        let _ = engine.book_ticket(service, booking(1));
                    });
                    black_box(&engine);
                })
            },
        );
    }
    group.finish();
}

// =============================================================================
// Scaling Benchmarks
// =============================================================================

fn bench_thread_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_scaling");
    let total_bookings = 10_000usize;
    const NUM_SERVICES: usize = 100;

    for num_threads in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(total_bookings as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .unwrap();

                b.iter(|| {
                    let (engine, services) = setup(
                        1,
                        NUM_SERVICES,
                        (total_bookings / NUM_SERVICES) as u32,
                    );
                    pool.install(|| {
                        (0..total_bookings).into_par_iter().for_each(|i| {
                            let service = services[i % NUM_SERVICES];
                            engine.book_ticket(service, booking(1)).unwrap();
                        });
                    });
                    black_box(&engine);
                })
            },
        );
    }
    group.finish();
}

fn bench_snapshot_with_growing_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_with_growing_history");

    // Snapshot cost as the ticket table grows.
    for tickets in [100, 1_000, 10_000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(tickets),
            tickets,
            |b, &tickets| {
                b.iter_batched(
                    || {
                        let (engine, services) = setup(1, 1, tickets as u32);
                        for _ in 0..tickets {
                            engine.book_ticket(services[0], booking(1)).unwrap();
                        }
                        (engine, services[0])
                    },
                    |(engine, service)| {
                        black_box(engine.service_snapshot(service).unwrap());
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(
    single_threaded,
    bench_single_booking,
    bench_book_then_cancel,
    bench_booking_throughput,
    bench_churn,
);

criterion_group!(
    multi_threaded,
    bench_parallel_bookings_one_service,
    bench_parallel_bookings_across_services,
);

criterion_group!(scaling, bench_contention, bench_thread_scaling,);

criterion_group!(memory, bench_snapshot_with_growing_history,);

criterion_main!(single_threaded, multi_threaded, scaling, memory);
