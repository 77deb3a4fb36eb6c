//! The `main` module defines the command-line interface and interacts with
//! the `seedrecover` library to run the recovery search.
//!

extern crate clap;
use clap::{App, Arg, ArgMatches};
use seedrecover::edit_distance::{expand, UNKNOWN_TOKEN};
use seedrecover::{
    compose_slots, select_length, BlockfrostClient, MatchOracle, RecoveryResult, SearchConfig,
    Slot, Target, WordList,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The function parses the command-line arguments.
fn parse_command_line<'a>() -> ArgMatches<'a> {
    // Extract the version from the Cargo.toml file.
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    App::new("seedrecover")
        .version(VERSION)
        .about("Recovers BIP-39 seed phrases for Cardano stake addresses.")
        .after_help(
            "NOTE: Seed words passed on the command line may be stored in your \
             shell history. Consider clearing the history afterwards or running \
             the tool from a throw-away shell session.",
        )
        .arg(
            Arg::with_name("wordlist") // A word-list file can be provided.
                .short("w")
                .long("wordlist")
                .help("Reads the word list from the provided file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("similar") // The maximum edit distance.
                .short("s")
                .long("similar")
                .help("Expands every word to word-list words within this edit distance")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("order") // Structured reordering can be enabled.
                .short("o")
                .long("order")
                .help("Also tries row/column transpositions of the written-down phrase")
                .takes_value(false),
        )
        .arg(
            Arg::with_name("length") // The phrase length.
                .short("l")
                .long("length")
                .help("Sets the phrase length (12, 15, 18, 21, or 24 words)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("missing") // The positions of missing words.
                .short("m")
                .long("missing")
                .help("Sets the 1-indexed positions of missing words (comma-separated)")
                .takes_value(true)
                .use_delimiter(true),
        )
        .arg(
            Arg::with_name("address") // The target stake addresses.
                .short("a")
                .long("address")
                .help("Adds a target stake address (exact or prefix...suffix)")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("blockfrost") // The chain oracle API key.
                .short("b")
                .long("blockfrost")
                .help("Checks candidate addresses for on-chain activity with this Blockfrost key")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("passphrase") // The BIP-39 passphrase.
                .short("p")
                .long("passphrase")
                .help("Uses this BIP-39 passphrase in the key derivation")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("workers") // The number of worker threads.
                .short("j")
                .long("workers")
                .help("Sets the number of worker threads")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose") // Verbose output can be enabled.
                .short("v")
                .long("verbose")
                .help("Prints verbose output")
                .takes_value(false),
        )
        .arg(
            Arg::with_name("words") // The known words, in order.
                .help("The known words of the phrase, in order ('?' for an unknown word)")
                .multiple(true),
        )
        .get_matches()
}

/// The function builds the slots for the known input words.
///
/// Every word is expanded within the configured edit distance and reported.
/// A word without any expansion is downgraded to an unknown slot with a
/// warning, so that the search can still proceed.
///
/// * `command_line` - The command-line arguments.
/// * `word_list` - The word list.
/// * `verbose` - Flag indicating if verbose output should be generated.
fn build_known_slots(
    command_line: &ArgMatches,
    word_list: &WordList,
    verbose: bool,
) -> RecoveryResult<Vec<Slot>> {
    // The maximum edit distance (0 without the --similar option).
    let max_distance = match command_line.value_of("similar") {
        Some(value) => value.parse::<usize>()?,
        None => 0,
    };
    let tokens: Vec<String> = command_line
        .values_of("words")
        .map(|values| values.map(|word| word.to_lowercase()).collect())
        .unwrap_or_default();
    let mut slots = vec![];
    for token in &tokens {
        if token == UNKNOWN_TOKEN || token.is_empty() {
            if verbose {
                println!("{}: any word", UNKNOWN_TOKEN);
            }
            slots.push(Slot::Unknown);
            continue;
        }
        let expansion = expand(token, max_distance, word_list);
        if expansion.indices.is_empty() {
            // The word cannot be matched at all: treat the position as unknown.
            eprintln!(
                "Warning: '{}' is not in the word list and has no replacement \
                 within distance {}; treating the position as unknown.",
                token, max_distance
            );
            slots.push(Slot::Unknown);
            continue;
        }
        // Report the expansion whenever it is not the word itself.
        if verbose || !expansion.in_word_list || expansion.indices.len() > 1 {
            let words: Vec<&str> = expansion
                .indices
                .iter()
                .map(|index| word_list.word_of(*index))
                .collect();
            println!("{}: {}", token, words.join(" "));
        }
        slots.push(Slot::Known(expansion.indices));
    }
    Ok(slots)
}

/// The function runs the recovery search.
///
/// The input to the function is the command-line arguments. The function
/// assembles the slots, the oracle, and the search configuration, and runs
/// the search until the candidate stream is drained or every target has
/// been found.
///
/// * `command_line` - The command-line arguments.
fn handle_search(command_line: &ArgMatches) -> RecoveryResult<()> {
    let verbose = command_line.is_present("verbose");
    // If a path to a word-list file is provided, try to load it.
    let word_list = match command_line.value_of("wordlist") {
        Some(file_path) => {
            if verbose {
                println!("Word list file: {}", file_path);
            }
            WordList::from_file(file_path)?
        }
        None => WordList::default_english(),
    };
    // Build the slots for the known words.
    let known_slots = build_known_slots(command_line, &word_list, verbose)?;
    // Parse the missing positions.
    let missing_positions: Vec<usize> = match command_line.values_of("missing") {
        Some(values) => values
            .map(|value| value.parse::<usize>())
            .collect::<Result<Vec<usize>, _>>()?,
        None => vec![],
    };
    // Parse the explicit length, if any.
    let length_hint = match command_line.value_of("length") {
        Some(value) => Some(value.parse::<usize>()?),
        None => None,
    };
    // Select the phrase length and compose the slot sequence.
    let length = select_length(known_slots.len(), &missing_positions, length_hint)?;
    println!("Assuming a phrase length of {} words.", length);
    let slots = compose_slots(known_slots, &missing_positions, length)?;
    // Assemble the match oracle.
    let targets: Vec<Target> = command_line
        .values_of("address")
        .map(|values| values.map(Target::parse).collect())
        .unwrap_or_default();
    let blockfrost = command_line
        .value_of("blockfrost")
        .map(BlockfrostClient::new);
    let oracle = MatchOracle::new(targets, blockfrost);
    // The number of worker threads.
    let num_workers = match command_line.value_of("workers") {
        Some(value) => value.parse::<usize>()?.max(1),
        None => std::thread::available_parallelism()
            .map(|workers| workers.get())
            .unwrap_or(1),
    };
    if verbose {
        println!("Using {} worker threads.", num_workers);
    }
    // Cancellation on Ctrl-C.
    let cancel = Arc::new(AtomicBool::new(false));
    let handler_cancel = cancel.clone();
    let _ = ctrlc::set_handler(move || {
        eprintln!("Interrupted; finishing up...");
        handler_cancel.store(true, Ordering::Relaxed);
    });
    // Run the search.
    let config = SearchConfig {
        slots,
        reorder: command_line.is_present("order"),
        passphrase: command_line
            .value_of("passphrase")
            .unwrap_or("")
            .to_string(),
        num_workers,
        report: true,
    };
    let outcome = seedrecover::run(&config, &word_list, &oracle, &cancel)?;
    if outcome.matches.is_empty() {
        println!("No matching phrase found.");
    }
    Ok(())
}

/// The main function runs the recovery search with the command-line arguments.
///
/// The process exits with a nonzero code only on usage or fatal errors;
/// finding no match is a normal completion.
fn main() {
    let command_line = parse_command_line();
    if let Err(error) = handle_search(&command_line) {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}
