//! The `search` module wires the candidate enumeration, the checksum and
//! repetition filters, the address derivation, and the match oracle into a
//! parallel search.
//!

use crate::candidates::{has_repetition, CandidateStream, Slot};
use crate::oracle::{MatchOracle, MatchReason, Verdict};
use crate::word_list::WordList;
use crate::{derivation, mnemonic, RecoveryError, RecoveryResult};
use crossbeam_channel::{bounded, unbounded};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;

/// The capacity of the candidate channel between the generator and the workers.
const CANDIDATE_CHANNEL_CAPACITY: usize = 1024;
/// The capacity of the channel between the derivation and the oracle workers.
const ORACLE_CHANNEL_CAPACITY: usize = 64;
/// The number of oracle workers; kept small to respect remote rate limits.
const NUM_ORACLE_WORKERS: usize = 2;

/// The configuration of a search run.
pub struct SearchConfig {
    /// The slot sequence of the phrase.
    pub slots: Vec<Slot>,
    /// Flag indicating whether structured reordering is enabled.
    pub reorder: bool,
    /// The passphrase used in the key derivation.
    pub passphrase: String,
    /// The number of worker threads.
    pub num_workers: usize,
    /// Flag indicating whether progress and matches are printed.
    pub report: bool,
}

/// The counters maintained during the search.
struct Counters {
    /// The number of enumerated candidates.
    total_checked: AtomicU64,
    /// The number of candidates that fulfilled the checksum.
    fulfilled_checksum: AtomicU64,
    /// The number of candidates that passed both filters.
    without_repetitions: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Counters {
            total_checked: AtomicU64::new(0),
            fulfilled_checksum: AtomicU64::new(0),
            without_repetitions: AtomicU64::new(0),
        }
    }
}

/// A reported candidate together with its derived address.
pub struct MatchRecord {
    /// The derived stake address.
    pub address: String,
    /// The word indices of the candidate phrase.
    pub indices: Vec<u16>,
    /// The reason for the match, or `None` if the chain activity is unknown.
    pub reason: Option<MatchReason>,
}

/// The outcome of a search run.
pub struct SearchOutcome {
    /// The reported candidates.
    pub matches: Vec<MatchRecord>,
    /// The number of enumerated candidates.
    pub total_checked: u64,
    /// The number of candidates that fulfilled the checksum.
    pub fulfilled_checksum: u64,
    /// The number of candidates that passed both filters.
    pub without_repetitions: u64,
}

/// The messages sent from the workers to the driver.
enum WorkerMessage {
    /// A candidate was classified.
    Classified {
        address: String,
        indices: Vec<u16>,
        verdict: Verdict,
    },
    /// A worker encountered a fatal error.
    Fatal(RecoveryError),
}

/// The function runs the search.
///
/// A generator thread enumerates the candidate stream into a bounded
/// channel; the worker threads validate the checksum, apply the repetition
/// filter, suppress duplicates, derive the stake address, and consult the
/// match oracle. The driver collects the results, prints progress at every
/// doubling of the total counter, and stops early once every user target
/// has matched and no chain oracle is active.
///
/// * `config` - The search configuration.
/// * `word_list` - The word list (used to print matching phrases).
/// * `oracle` - The match oracle.
/// * `cancel` - The cancellation flag, shared with the caller.
pub fn run(
    config: &SearchConfig,
    word_list: &WordList,
    oracle: &MatchOracle,
    cancel: &AtomicBool,
) -> RecoveryResult<SearchOutcome> {
    let counters = Counters::new();
    // The dedup set holds the packed encoding of every reported candidate.
    // It only grows with candidates that pass both filters, so it stays small.
    let reported: Mutex<HashSet<Vec<u8>>> = Mutex::new(HashSet::new());
    let (candidate_sender, candidate_receiver) =
        bounded::<Vec<u16>>(CANDIDATE_CHANNEL_CAPACITY);
    let (result_sender, result_receiver) = unbounded::<WorkerMessage>();
    // With a chain oracle, classification moves to a small separate worker
    // pool behind a bounded channel, so that the derivation workers cannot
    // flood the remote service.
    let (oracle_sender, oracle_receiver) = bounded::<(String, Vec<u16>)>(ORACLE_CHANNEL_CAPACITY);
    let use_oracle_stage = oracle.has_chain_oracle();

    let mut matches = vec![];
    let mut fatal_error: Option<RecoveryError> = None;

    thread::scope(|scope| {
        // The generator thread enumerates the candidates.
        let generator_counters = &counters;
        let generator_report = config.report;
        scope.spawn(move || {
            let stream = CandidateStream::new(&config.slots, config.reorder);
            for candidate in stream {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
                let total = generator_counters.total_checked.fetch_add(1, Ordering::Relaxed) + 1;
                // Report progress at every doubling of the total counter.
                if generator_report && total >= 2 && total & (total - 1) == 0 {
                    println!(
                        "Checked {} candidates: {} fulfilled the checksum, {} without repetitions.",
                        total,
                        generator_counters.fulfilled_checksum.load(Ordering::Relaxed),
                        generator_counters.without_repetitions.load(Ordering::Relaxed)
                    );
                }
                if candidate_sender.send(candidate).is_err() {
                    break;
                }
            }
            // Dropping the sender lets the workers drain and finish.
        });

        // The worker threads validate, derive, and classify the candidates.
        for _ in 0..config.num_workers.max(1) {
            let worker_receiver = candidate_receiver.clone();
            let worker_sender = result_sender.clone();
            let worker_oracle_sender = oracle_sender.clone();
            let worker_counters = &counters;
            let worker_reported = &reported;
            let passphrase = config.passphrase.as_str();
            scope.spawn(move || {
                for candidate in worker_receiver.iter() {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    // Filter 1: the BIP-0039 checksum.
                    if !mnemonic::is_valid(&candidate).unwrap_or(false) {
                        continue;
                    }
                    worker_counters
                        .fulfilled_checksum
                        .fetch_add(1, Ordering::Relaxed);
                    // Filter 2: no word occurs three or more times.
                    if has_repetition(&candidate) {
                        continue;
                    }
                    worker_counters
                        .without_repetitions
                        .fetch_add(1, Ordering::Relaxed);
                    // Suppress duplicates across reorder strategies.
                    let key = mnemonic::bytes_from_indices(&candidate);
                    {
                        // The unwrap() is okay because the set is only locked here.
                        let mut reported_set = worker_reported.lock().unwrap();
                        if !reported_set.insert(key) {
                            continue;
                        }
                    }
                    // Derive the stake address.
                    let entropy = match mnemonic::entropy_of(&candidate) {
                        Ok(entropy) => entropy,
                        Err(_) => continue,
                    };
                    let address = match derivation::stake_address(&entropy, passphrase) {
                        Ok(address) => address,
                        // A degenerate derivation skips the candidate.
                        Err(RecoveryError::DerivationDegenerate) => continue,
                        Err(error) => {
                            let _ = worker_sender.send(WorkerMessage::Fatal(error));
                            cancel.store(true, Ordering::Relaxed);
                            break;
                        }
                    };
                    if use_oracle_stage {
                        // Hand the candidate to the oracle workers; the bounded
                        // channel provides backpressure.
                        if worker_oracle_sender.send((address, candidate)).is_err() {
                            break;
                        }
                        continue;
                    }
                    // Without a chain oracle, classification is pure and cheap.
                    match oracle.classify(&address) {
                        Ok(Verdict::NoMatch) => {}
                        Ok(verdict) => {
                            let _ = worker_sender.send(WorkerMessage::Classified {
                                address,
                                indices: candidate,
                                verdict,
                            });
                        }
                        Err(error) => {
                            let _ = worker_sender.send(WorkerMessage::Fatal(error));
                            cancel.store(true, Ordering::Relaxed);
                            break;
                        }
                    }
                }
            });
        }

        // The oracle workers consult the chain oracle, at most a few at a
        // time so that the remote rate limits are respected.
        if use_oracle_stage {
            for _ in 0..NUM_ORACLE_WORKERS {
                let worker_receiver = oracle_receiver.clone();
                let worker_sender = result_sender.clone();
                scope.spawn(move || {
                    for (address, indices) in worker_receiver.iter() {
                        if cancel.load(Ordering::Relaxed) {
                            break;
                        }
                        match oracle.classify(&address) {
                            Ok(Verdict::NoMatch) => {}
                            Ok(verdict) => {
                                let _ = worker_sender.send(WorkerMessage::Classified {
                                    address,
                                    indices,
                                    verdict,
                                });
                            }
                            Err(error) => {
                                let _ = worker_sender.send(WorkerMessage::Fatal(error));
                                cancel.store(true, Ordering::Relaxed);
                                break;
                            }
                        }
                    }
                });
            }
        }
        // The driver holds no senders, so the loop ends when the workers finish.
        drop(candidate_receiver);
        drop(oracle_sender);
        drop(oracle_receiver);
        drop(result_sender);

        // Collect the results.
        let mut matched_targets = HashSet::new();
        for message in result_receiver.iter() {
            match message {
                WorkerMessage::Classified {
                    address,
                    indices,
                    verdict,
                } => {
                    let phrase = word_list.phrase_of_indices(&indices);
                    match verdict {
                        Verdict::Match(reason) => {
                            if config.report {
                                println!("{}: {}", address, phrase);
                            }
                            if let MatchReason::UserTarget(index) = reason {
                                matched_targets.insert(index);
                                // Stop early once every target has matched and
                                // no chain oracle is active.
                                if !oracle.has_chain_oracle()
                                    && matched_targets.len() == oracle.num_targets()
                                {
                                    cancel.store(true, Ordering::Relaxed);
                                }
                            }
                            matches.push(MatchRecord {
                                address,
                                indices,
                                reason: Some(reason),
                            });
                        }
                        Verdict::UnknownActivity => {
                            if config.report {
                                println!("{}: {} (activity unknown)", address, phrase);
                            }
                            matches.push(MatchRecord {
                                address,
                                indices,
                                reason: None,
                            });
                        }
                        Verdict::NoMatch => {}
                    }
                }
                WorkerMessage::Fatal(error) => {
                    if fatal_error.is_none() {
                        fatal_error = Some(error);
                    }
                    cancel.store(true, Ordering::Relaxed);
                }
            }
        }
    });

    if let Some(error) = fatal_error {
        return Err(error);
    }
    let outcome = SearchOutcome {
        matches,
        total_checked: counters.total_checked.load(Ordering::Relaxed),
        fulfilled_checksum: counters.fulfilled_checksum.load(Ordering::Relaxed),
        without_repetitions: counters.without_repetitions.load(Ordering::Relaxed),
    };
    if config.report {
        println!(
            "Done: {} candidates checked, {} fulfilled the checksum, {} without repetitions.",
            outcome.total_checked, outcome.fulfilled_checksum, outcome.without_repetitions
        );
    }
    Ok(outcome)
}

// ******************************** TESTS ********************************
