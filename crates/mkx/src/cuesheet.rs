//! Cue sheets built from chapters and tags.
//!
//! Each visible chapter becomes one `TRACK` whose `INDEX 01` is the
//! chapter start. Album-level values come from tags with a target type of
//! 50 or more, chapter titles and performers from tags targeting the
//! chapter UID, falling back to the chapter display string.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use matroska::{ChapterAtom, Tag};

const FRAMES_PER_SECOND: u64 = 75;
const NANOS_PER_SECOND: u64 = 1_000_000_000;
const ALBUM_TARGET_TYPE: u64 = 50;

/// Output path with its extension replaced by `.cue`.
pub fn cue_sheet_path(output: &Path) -> PathBuf {
    output.with_extension("cue")
}

/// Writes a cue sheet for `audio_file`.
///
/// `track_uid` restricts album tags to those targeting no track or this
/// track.
pub fn write_cue_sheet<W: Write>(
    writer: &mut W,
    audio_file: &Path,
    chapters: &[ChapterAtom],
    tags: &[Tag],
    track_uid: Option<u64>,
) -> io::Result<()> {
    if let Some(album) = album_tag(tags, track_uid) {
        if let Some(genre) = album.value("GENRE") {
            writeln!(writer, "REM GENRE {}", quote(genre))?;
        }
        if let Some(date) = album.value("DATE_RELEASED").or_else(|| album.value("DATE")) {
            writeln!(writer, "REM DATE {date}")?;
        }
        if let Some(artist) = album.value("ARTIST") {
            writeln!(writer, "PERFORMER {}", quote(artist))?;
        }
        if let Some(title) = album.value("TITLE") {
            writeln!(writer, "TITLE {}", quote(title))?;
        }
    }

    let file_name = audio_file
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_else(|| audio_file.to_string_lossy());
    writeln!(writer, "FILE {} WAVE", quote(&file_name))?;

    for (index, atom) in chapters.iter().filter(|atom| !atom.hidden).enumerate() {
        let chapter_tag = atom.uid.and_then(|uid| chapter_tag(tags, uid));

        writeln!(writer, "  TRACK {:02} AUDIO", index + 1)?;
        let title = chapter_tag
            .and_then(|tag| tag.value("TITLE"))
            .or_else(|| atom.title());
        if let Some(title) = title {
            writeln!(writer, "    TITLE {}", quote(title))?;
        }
        if let Some(artist) = chapter_tag.and_then(|tag| tag.value("ARTIST")) {
            writeln!(writer, "    PERFORMER {}", quote(artist))?;
        }
        writeln!(writer, "    INDEX 01 {}", index_time(atom.time_start))?;
    }

    Ok(())
}

fn album_tag(tags: &[Tag], track_uid: Option<u64>) -> Option<&Tag> {
    tags.iter().find(|tag| {
        let targets = &tag.targets;
        targets.type_value >= ALBUM_TARGET_TYPE
            && targets.chapter_uids.is_empty()
            && (targets.track_uids.is_empty()
                || track_uid.is_some_and(|uid| targets.track_uids.contains(&uid)))
    })
}

fn chapter_tag(tags: &[Tag], chapter_uid: u64) -> Option<&Tag> {
    tags.iter().find(|tag| tag.targets.chapter_uids.contains(&chapter_uid))
}

/// `mm:ss:ff` with 75 frames per second.
fn index_time(nanos: u64) -> String {
    let seconds = nanos / NANOS_PER_SECOND;
    let frames = (nanos % NANOS_PER_SECOND) * FRAMES_PER_SECOND / NANOS_PER_SECOND;
    format!("{:02}:{:02}:{:02}", seconds / 60, seconds % 60, frames)
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "'"))
}
