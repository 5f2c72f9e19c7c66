//! ExternalSorter: balanced k-way merge sort of a record heap.

use super::run::{RunReader, RunWriter};
use super::selection::SelectionHeap;
use crate::heap::RecordHeap;
use shelf_common::{scratch_path_in, Record, Result, ShelfError, SortStrategy, StoreConfig};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of a completed sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSummary {
    /// Live records written back to the heap.
    pub records: usize,
    /// Runs produced by the distribution phase.
    pub initial_runs: usize,
    /// Merge passes needed to reduce them to one run.
    pub merge_passes: usize,
}

impl fmt::Display for SortSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records, {} initial runs, {} merge passes",
            self.records, self.initial_runs, self.merge_passes
        )
    }
}

/// Orders records by identifier.
pub fn by_id<T: Record>() -> impl Fn(&T, &T) -> Ordering {
    |a: &T, b: &T| a.id().cmp(&b.id())
}

/// Orders records by the named field. Records missing the field sort first
/// and incomparable values compare equal.
pub fn by_field<T: Record>(name: &str) -> impl Fn(&T, &T) -> Ordering {
    let name = name.to_string();
    move |a: &T, b: &T| {
        a.field(&name)
            .partial_cmp(&b.field(&name))
            .unwrap_or(Ordering::Equal)
    }
}

/// Scratch branch files, removed when dropped.
struct ScratchFiles {
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    fn new(dir: &Path, heap_path: &Path, count: usize) -> Self {
        let stem = heap_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "heap".to_string());
        let extension = heap_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "db".to_string());
        let paths = (0..count)
            .map(|n| scratch_path_in(dir, &stem, n, &extension))
            .collect();
        Self { paths }
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove scratch file");
                }
            }
        }
    }
}

/// External merge sorter over `branches` pairs of scratch files.
///
/// Distribution writes sorted runs round-robin to the input branches; each
/// merge pass combines one run from every input branch into one output run
/// and then swaps the two file sets, until a single run remains.
#[derive(Debug, Clone)]
pub struct ExternalSorter {
    scratch_dir: PathBuf,
    branches: usize,
    block_size: usize,
    strategy: SortStrategy,
}

impl ExternalSorter {
    /// Fails with `InvalidConfiguration` if `branches` or `block_size` is at most 1.
    pub fn new(
        scratch_dir: impl Into<PathBuf>,
        branches: usize,
        block_size: usize,
        strategy: SortStrategy,
    ) -> Result<Self> {
        if branches <= 1 {
            return Err(ShelfError::InvalidConfiguration(format!(
                "sort branches {branches} <= 1"
            )));
        }
        if block_size <= 1 {
            return Err(ShelfError::InvalidConfiguration(format!(
                "sort block size {block_size} <= 1"
            )));
        }
        Ok(Self {
            scratch_dir: scratch_dir.into(),
            branches,
            block_size,
            strategy,
        })
    }

    /// Sorter that keeps its scratch files in the configured data directory.
    pub fn with_config(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            &config.data_dir,
            config.sort_branches,
            config.sort_block_size,
            config.sort_strategy,
        )
    }

    #[inline]
    pub fn strategy(&self) -> SortStrategy {
        self.strategy
    }

    /// Sorts the live records of `heap` by `compare` and writes them back.
    ///
    /// Records keep their identifiers; addresses change, so indexes over the
    /// heap must be rebuilt afterwards.
    pub fn sort<T, F>(&self, heap: &mut RecordHeap<T>, compare: F) -> Result<SortSummary>
    where
        T: Record,
        F: Fn(&T, &T) -> Ordering,
    {
        let expected = heap.count()?;
        if expected == 0 {
            return Ok(SortSummary::default());
        }

        let k = self.branches;
        let scratch = ScratchFiles::new(&self.scratch_dir, heap.path(), 2 * k);
        let (first, second) = scratch.paths.split_at(k);
        let mut inputs: Vec<PathBuf> = first.to_vec();
        let mut outputs: Vec<PathBuf> = second.to_vec();

        let initial_runs = match self.strategy {
            SortStrategy::FixedBlock => self.distribute_blocks(heap, &inputs, &compare)?,
            SortStrategy::ReplacementSelection => {
                self.distribute_selection(heap, &inputs, &compare)?
            }
        };
        debug!(runs = initial_runs, strategy = ?self.strategy, "sort distribution done");

        let mut runs = initial_runs;
        let mut run_len = self.block_size;
        let mut merge_passes = 0;
        while runs > 1 {
            let ceiling = match self.strategy {
                SortStrategy::FixedBlock => Some(run_len),
                SortStrategy::ReplacementSelection => None,
            };
            runs = Self::merge_pass::<T, F>(&inputs, &outputs, &compare, ceiling)?;
            run_len = run_len.saturating_mul(k);
            merge_passes += 1;
            debug!(pass = merge_passes, runs, "sort merge pass done");
            std::mem::swap(&mut inputs, &mut outputs);
        }

        let records = heap.restore(RunReader::<T>::open(&inputs[0])?)?;
        if records != expected {
            return Err(ShelfError::corrupted(
                heap.path(),
                format!("sort wrote back {records} of {expected} records"),
            ));
        }

        let summary = SortSummary {
            records,
            initial_runs,
            merge_passes,
        };
        info!(path = %heap.path().display(), %summary, "sort complete");
        Ok(summary)
    }

    /// Sorts `block_size` records at a time in memory and deals the sorted
    /// blocks round-robin to the branches. Returns the number of runs.
    fn distribute_blocks<T, F>(
        &self,
        heap: &RecordHeap<T>,
        branches: &[PathBuf],
        compare: &F,
    ) -> Result<usize>
    where
        T: Record,
        F: Fn(&T, &T) -> Ordering,
    {
        let mut writers = create_writers(branches)?;
        let mut block = Vec::with_capacity(self.block_size);
        let mut runs = 0;

        let mut flush = |block: &mut Vec<T>, runs: &mut usize| -> Result<()> {
            block.sort_by(compare);
            let writer = &mut writers[*runs % branches.len()];
            for record in block.drain(..) {
                writer.push(&record)?;
            }
            *runs += 1;
            Ok(())
        };

        for slot in heap.scan()? {
            block.push(slot?.record);
            if block.len() == self.block_size {
                flush(&mut block, &mut runs)?;
            }
        }
        if !block.is_empty() {
            flush(&mut block, &mut runs)?;
        }

        finish_writers(writers)?;
        Ok(runs)
    }

    /// Replacement selection: a heap of `block_size` records emits its
    /// minimum and takes the next input, which joins the current run unless
    /// it sorts before the record just emitted. Run `r` goes to branch
    /// `r % k`. Returns the number of runs.
    fn distribute_selection<T, F>(
        &self,
        heap: &RecordHeap<T>,
        branches: &[PathBuf],
        compare: &F,
    ) -> Result<usize>
    where
        T: Record,
        F: Fn(&T, &T) -> Ordering,
    {
        let mut writers = create_writers(branches)?;
        let mut selection = SelectionHeap::with_capacity(self.block_size);
        let mut last: Option<(usize, T)> = None;

        for slot in heap.scan()? {
            let record = slot?.record;
            if selection.len() >= self.block_size {
                if let Some((run, min)) = selection.pop(compare) {
                    writers[run % branches.len()].push(&min)?;
                    last = Some((run, min));
                }
            }
            let run = match &last {
                Some((run, previous)) if compare(&record, previous) == Ordering::Less => run + 1,
                Some((run, _)) => *run,
                None => 0,
            };
            selection.push(run, record, compare);
        }
        while let Some((run, min)) = selection.pop(compare) {
            writers[run % branches.len()].push(&min)?;
            last = Some((run, min));
        }

        finish_writers(writers)?;
        Ok(last.map_or(0, |(run, _)| run + 1))
    }

    /// Merges one run from every input into each output run, writing output
    /// runs round-robin. A run ends after `ceiling` records when given, or
    /// otherwise where the next record sorts before the previous one.
    /// Returns the number of runs written.
    fn merge_pass<T, F>(
        inputs: &[PathBuf],
        outputs: &[PathBuf],
        compare: &F,
        ceiling: Option<usize>,
    ) -> Result<usize>
    where
        T: Record,
        F: Fn(&T, &T) -> Ordering,
    {
        let mut readers = inputs
            .iter()
            .map(|path| RunReader::<T>::open(path))
            .collect::<Result<Vec<_>>>()?;
        let mut writers = create_writers(outputs)?;
        let mut runs = 0;

        while readers.iter().any(|r| r.peek().is_some()) {
            let writer = &mut writers[runs % outputs.len()];
            let mut active = vec![true; readers.len()];
            let mut taken = vec![0usize; readers.len()];
            let mut last: Vec<Option<T>> = vec![None; readers.len()];

            loop {
                let mut best: Option<usize> = None;
                for i in 0..readers.len() {
                    if !active[i] {
                        continue;
                    }
                    let Some(head) = readers[i].peek() else {
                        active[i] = false;
                        continue;
                    };
                    let in_run = match ceiling {
                        Some(limit) => taken[i] < limit,
                        None => last[i]
                            .as_ref()
                            .map_or(true, |prev| compare(head, prev) != Ordering::Less),
                    };
                    if !in_run {
                        active[i] = false;
                        continue;
                    }
                    best = match best.and_then(|b| readers[b].peek().map(|h| (b, h))) {
                        Some((b, current)) if compare(head, current) != Ordering::Less => Some(b),
                        _ => Some(i),
                    };
                }

                let Some(i) = best else {
                    break;
                };
                let Some(record) = readers[i].advance()? else {
                    break;
                };
                writer.push(&record)?;
                taken[i] += 1;
                last[i] = Some(record);
            }
            runs += 1;
        }

        finish_writers(writers)?;
        Ok(runs)
    }
}

fn create_writers(paths: &[PathBuf]) -> Result<Vec<RunWriter>> {
    paths.iter().map(|path| RunWriter::create(path)).collect()
}

fn finish_writers(writers: Vec<RunWriter>) -> Result<usize> {
    let mut total = 0;
    for writer in writers {
        total += writer.finish()?;
    }
    Ok(total)
}
