use std::io;
use std::num::NonZeroUsize;
use std::sync::{mpsc, Mutex};
use std::thread;

use tracing::{debug, debug_span};

use crate::search::{DecodeFailure, Decoder, Derivation, Sentence};

pub type DecodeResult = Result<Derivation, DecodeFailure>;

/// Decode `sentences` on a pool of `threads` workers (`0` = one per
/// available core). Results come back in input order; a failed sentence does
/// not stop the others.
///
/// Only spawning a worker can fail.
pub fn decode_batch(
    decoder: &Decoder,
    sentences: &[Sentence],
    threads: usize,
) -> io::Result<Vec<DecodeResult>> {
    let threads = match threads {
        0 => thread::available_parallelism().map_or(1, NonZeroUsize::get),
        n => n,
    }
    .min(sentences.len())
    .max(1);
    let _span = debug_span!("decode_batch", sentences = sentences.len(), threads).entered();

    let (work_tx, work_rx) = mpsc::channel::<(usize, &Sentence)>();
    for item in sentences.iter().enumerate() {
        if work_tx.send(item).is_err() {
            debug!("work queue closed");
            break;
        }
    }
    drop(work_tx);
    let work_rx = Mutex::new(work_rx);
    let (result_tx, result_rx) = mpsc::channel::<(usize, DecodeResult)>();

    thread::scope(|scope| -> io::Result<()> {
        for worker in 0..threads {
            let work_rx = &work_rx;
            let result_tx = result_tx.clone();
            thread::Builder::new()
                .name(format!("phrase-decode-{worker}"))
                .spawn_scoped(scope, move || decode_worker(decoder, work_rx, result_tx))?;
        }
        Ok(())
    })?;
    drop(result_tx);

    // Workers have all joined, so every sentence has exactly one result.
    let mut results: Vec<Option<DecodeResult>> = (0..sentences.len()).map(|_| None).collect();
    for (index, result) in result_rx {
        results[index] = Some(result);
    }
    Ok(results.into_iter().flatten().collect())
}

fn decode_worker(
    decoder: &Decoder,
    work_rx: &Mutex<mpsc::Receiver<(usize, &Sentence)>>,
    result_tx: mpsc::Sender<(usize, DecodeResult)>,
) {
    loop {
        let next = match work_rx.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => return,
        };
        let Ok((index, sentence)) = next else {
            return;
        };
        let result = decoder.decode(sentence);
        if let Err(failure) = &result {
            debug!(index, %failure, "sentence failed");
        }
        if result_tx.send((index, result)).is_err() {
            return;
        }
    }
}
