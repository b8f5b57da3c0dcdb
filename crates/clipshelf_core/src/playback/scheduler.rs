use super::{AudioBackend, PlaybackError, PlaybackOptions, PlaybackResult};
use crate::cache::SoundCache;
use crate::model::sound::Sound;
use crate::repo::sound_repo::SoundRepository;
use crate::storage::StorageCommander;
use log::{error, info};
use std::thread;
use std::time::Instant;

/// Plays resolved clips one after another or overlapping.
pub struct PlaybackScheduler<B: AudioBackend> {
    backend: B,
}

impl<B: AudioBackend> PlaybackScheduler<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Plays every named clip to completion, in input order, on the calling
    /// thread. Clip `n + 1` starts only after clip `n` finished.
    ///
    /// # Errors
    /// - `InvalidOptions` before any lookup.
    /// - `NotFound(name)` for the first unresolved name; nothing is played.
    /// - The first backend error; later clips are not started.
    pub fn play_sequence<R, C, S>(
        &self,
        storage: &StorageCommander<R, C>,
        names: &[S],
        options: PlaybackOptions,
    ) -> PlaybackResult<()>
    where
        R: SoundRepository,
        C: SoundCache,
        S: AsRef<str>,
    {
        let started_at = Instant::now();
        let sounds = resolve(storage, names, &options)?;
        if sounds.is_empty() {
            return Ok(());
        }

        for sound in &sounds {
            if let Err(err) = self.backend.play(&sound.file_path, &options) {
                error!(
                    "event=playback_sequence module=playback status=error name={} error={}",
                    sound.name, err
                );
                return Err(err);
            }
        }

        info!(
            "event=playback_sequence module=playback status=ok clips={} duration_ms={}",
            sounds.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Starts every named clip at once on its own thread and returns once
    /// all of them have finished.
    ///
    /// # Errors
    /// - Same resolution errors as [`Self::play_sequence`].
    /// - The first backend error in input order, reported after every
    ///   thread has been joined.
    pub fn play_parallel<R, C, S>(
        &self,
        storage: &StorageCommander<R, C>,
        names: &[S],
        options: PlaybackOptions,
    ) -> PlaybackResult<()>
    where
        R: SoundRepository,
        C: SoundCache,
        S: AsRef<str>,
    {
        let started_at = Instant::now();
        let sounds = resolve(storage, names, &options)?;
        if sounds.is_empty() {
            return Ok(());
        }

        let backend = &self.backend;
        let results: Vec<PlaybackResult<()>> = thread::scope(|scope| {
            let handles: Vec<_> = sounds
                .iter()
                .map(|sound| scope.spawn(move || backend.play(&sound.file_path, &options)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(PlaybackError::Output(
                            "playback thread panicked".to_string(),
                        ))
                    })
                })
                .collect()
        });

        for (sound, result) in sounds.iter().zip(&results) {
            if let Err(err) = result {
                error!(
                    "event=playback_parallel module=playback status=error name={} error={}",
                    sound.name, err
                );
            }
        }
        results.into_iter().collect::<PlaybackResult<Vec<()>>>()?;

        info!(
            "event=playback_parallel module=playback status=ok clips={} duration_ms={}",
            sounds.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }
}

fn resolve<R, C, S>(
    storage: &StorageCommander<R, C>,
    names: &[S],
    options: &PlaybackOptions,
) -> PlaybackResult<Vec<Sound>>
where
    R: SoundRepository,
    C: SoundCache,
    S: AsRef<str>,
{
    options.validate()?;
    if names.is_empty() {
        return Ok(Vec::new());
    }
    storage.resolve_all(names).map_err(|err| {
        let err = PlaybackError::from(err);
        error!("event=playback_resolve module=playback status=error error={err}");
        err
    })
}
