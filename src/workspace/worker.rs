//! Off-thread parsing.
//!
//! A [`ParserPool`] owns a fixed number of worker threads, each fed by its
//! own request channel and answering on a channel shared by the pool:
//!
//! ```text
//!            ┌─► worker 0 ─┐
//! requests ──┼─► worker 1 ─┼──► responses ──► hydrate ──► ParseResult
//!            └─► worker 2 ─┘
//! ```
//!
//! Each worker has at most one request in flight and requests are handed
//! out round-robin. A worker whose parse panics reports the failure and
//! exits; it is respawned the next time it is picked.
//!
//! Worker stacks are sized like the scoped parser thread of
//! [`parse_with`](crate::parser::parse_with), so workers parse directly on
//! their own stack.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::base::DocumentId;
use crate::grammar::Grammar;
use crate::parser::{ParseOptions, parse_on_current_stack};
use crate::semantic::panic_message;
use crate::syntax::{FlatParse, MalformedParse, ParseResult};

/// The parse function run on worker threads.
pub type ParseFn = Arc<dyn Fn(&str) -> FlatParse + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerFailure {
    #[error("parser worker {worker} panicked: {message}")]
    Panicked { worker: usize, message: String },
    #[error("parser worker {worker} could not be started: {message}")]
    Spawn { worker: usize, message: String },
    #[error("parser worker {worker} returned a malformed tree: {source}")]
    Malformed {
        worker: usize,
        #[source]
        source: MalformedParse,
    },
}

struct Request {
    document: DocumentId,
    text: Arc<str>,
}

struct Response {
    worker: usize,
    document: DocumentId,
    result: Result<FlatParse, String>,
}

#[derive(Default)]
struct Worker {
    sender: Option<Sender<Request>>,
    handle: Option<JoinHandle<()>>,
    busy: bool,
}

impl Worker {
    fn is_alive(&self) -> bool {
        self.sender.is_some()
    }

    fn shut_down(&mut self) {
        self.sender = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub struct ParserPool {
    workers: Vec<Worker>,
    parse: ParseFn,
    responses_tx: Sender<Response>,
    responses: Receiver<Response>,
    next: usize,
    spawned: usize,
    stack_size: usize,
}

impl std::fmt::Debug for ParserPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserPool")
            .field("size", &self.workers.len())
            .field("spawned", &self.spawned)
            .field("stack_size", &self.stack_size)
            .finish()
    }
}

impl ParserPool {
    /// A pool of `size` workers (at least one) running `parse`.
    /// Threads start on first use, with the stack a default-depth parse needs.
    pub fn new(size: usize, parse: ParseFn) -> Self {
        let (responses_tx, responses) = mpsc::channel();
        Self {
            workers: (0..size.max(1)).map(|_| Worker::default()).collect(),
            parse,
            responses_tx,
            responses,
            next: 0,
            spawned: 0,
            stack_size: ParseOptions::default().stack_size(),
        }
    }

    pub fn for_grammar(size: usize, grammar: Arc<Grammar>, options: ParseOptions) -> Self {
        let stack_size = options.stack_size();
        let parse: ParseFn =
            Arc::new(move |text: &str| parse_on_current_stack(&grammar, text, &options).flatten());
        Self::new(size, parse).with_stack_size(stack_size)
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Threads started so far, respawns included.
    pub fn spawned(&self) -> usize {
        self.spawned
    }

    /// Parses every request, returning results in completion order.
    ///
    /// Cancellation stops handing out new requests; requests already in
    /// flight are awaited so no parse is abandoned halfway. Documents that
    /// were never sent are absent from the result.
    pub fn parse_all(
        &mut self,
        requests: Vec<(DocumentId, Arc<str>)>,
        cancel: &CancellationToken,
    ) -> Vec<(DocumentId, Result<ParseResult, WorkerFailure>)> {
        let mut pending: VecDeque<Request> = requests
            .into_iter()
            .map(|(document, text)| Request { document, text })
            .collect();
        let mut results = Vec::new();
        let mut in_flight = 0;

        loop {
            while !cancel.is_cancelled() {
                let Some(worker) = self.idle_worker() else {
                    break;
                };
                let Some(request) = pending.pop_front() else {
                    break;
                };
                let document = request.document;
                match self.dispatch(worker, request) {
                    Ok(()) => in_flight += 1,
                    Err(failure) => results.push((document, Err(failure))),
                }
            }
            if in_flight == 0 {
                break;
            }
            let Ok(response) = self.responses.recv() else {
                break;
            };
            in_flight -= 1;
            results.push((response.document, self.receive(response)));
        }
        results
    }

    /// Round-robin over workers without a request in flight.
    fn idle_worker(&mut self) -> Option<usize> {
        let count = self.workers.len();
        let found = (0..count)
            .map(|offset| (self.next + offset) % count)
            .find(|&index| !self.workers[index].busy)?;
        self.next = (found + 1) % count;
        Some(found)
    }

    fn dispatch(&mut self, index: usize, request: Request) -> Result<(), WorkerFailure> {
        if !self.workers[index].is_alive() {
            self.spawn(index)?;
        }
        let Err(request) = self.try_send(index, request) else {
            return Ok(());
        };
        // The thread is gone; start over with a fresh one.
        self.workers[index].shut_down();
        self.spawn(index)?;
        self.try_send(index, request)
            .map_err(|_| WorkerFailure::Spawn {
                worker: index,
                message: "worker exited before accepting work".to_string(),
            })
    }

    fn try_send(&mut self, index: usize, request: Request) -> Result<(), Request> {
        let worker = &mut self.workers[index];
        match &worker.sender {
            Some(sender) => sender.send(request).map_err(|mpsc::SendError(request)| request)?,
            None => return Err(request),
        }
        worker.busy = true;
        Ok(())
    }

    fn spawn(&mut self, index: usize) -> Result<(), WorkerFailure> {
        let (sender, requests) = mpsc::channel::<Request>();
        let responses = self.responses_tx.clone();
        let parse = self.parse.clone();
        let handle = thread::Builder::new()
            .name(format!("strand-parser-{index}"))
            .stack_size(self.stack_size)
            .spawn(move || run_worker(index, requests, responses, parse))
            .map_err(|err| WorkerFailure::Spawn {
                worker: index,
                message: err.to_string(),
            })?;
        self.spawned += 1;
        tracing::debug!(worker = index, spawned = self.spawned, "parser worker started");
        self.workers[index] = Worker {
            sender: Some(sender),
            handle: Some(handle),
            busy: false,
        };
        Ok(())
    }

    fn receive(&mut self, response: Response) -> Result<ParseResult, WorkerFailure> {
        let worker = response.worker;
        self.workers[worker].busy = false;
        match response.result {
            Ok(flat) => flat
                .hydrate()
                .map_err(|source| WorkerFailure::Malformed { worker, source }),
            Err(message) => {
                tracing::warn!(worker, document = %response.document, %message, "parser worker failed");
                self.workers[worker].shut_down();
                Err(WorkerFailure::Panicked { worker, message })
            }
        }
    }
}

impl Drop for ParserPool {
    fn drop(&mut self) {
        for worker in &mut self.workers {
            worker.shut_down();
        }
    }
}

fn run_worker(index: usize, requests: Receiver<Request>, responses: Sender<Response>, parse: ParseFn) {
    while let Ok(request) = requests.recv() {
        let result = catch_unwind(AssertUnwindSafe(|| parse(&request.text)))
            .map_err(|payload| panic_message(payload.as_ref()));
        let failed = result.is_err();
        let response = Response {
            worker: index,
            document: request.document,
            result,
        };
        if responses.send(response).is_err() || failed {
            break;
        }
    }
}
