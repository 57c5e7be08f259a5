use bytes::Bytes;

use crate::ebml::{Children, read_string, read_uint};
use crate::error::Result;
use crate::ids;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditionEntry {
    pub atoms: Vec<ChapterAtom>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterAtom {
    pub uid: Option<u64>,
    /// Start in nanoseconds.
    pub time_start: u64,
    /// End in nanoseconds.
    pub time_end: Option<u64>,
    pub hidden: bool,
    pub enabled: bool,
    pub displays: Vec<ChapterDisplay>,
    pub children: Vec<ChapterAtom>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDisplay {
    pub string: String,
    pub languages: Vec<String>,
}

impl ChapterAtom {
    /// The first display string, if any.
    pub fn title(&self) -> Option<&str> {
        self.displays.first().map(|display| display.string.as_str())
    }

    fn parse(body: Bytes) -> Result<Self> {
        let mut atom = ChapterAtom {
            uid: None,
            time_start: 0,
            time_end: None,
            hidden: false,
            enabled: true,
            displays: Vec::new(),
            children: Vec::new(),
        };

        for child in Children::new(body) {
            let (id, data) = child?;
            match id {
                ids::CHAPTER_UID => atom.uid = Some(read_uint(id, &data)?),
                ids::CHAPTER_TIME_START => atom.time_start = read_uint(id, &data)?,
                ids::CHAPTER_TIME_END => atom.time_end = Some(read_uint(id, &data)?),
                ids::CHAPTER_FLAG_HIDDEN => atom.hidden = read_uint(id, &data)? != 0,
                ids::CHAPTER_FLAG_ENABLED => atom.enabled = read_uint(id, &data)? != 0,
                ids::CHAPTER_DISPLAY => atom.displays.push(parse_display(data)?),
                ids::CHAPTER_ATOM => atom.children.push(ChapterAtom::parse(data)?),
                _ => {}
            }
        }

        Ok(atom)
    }
}

fn parse_display(body: Bytes) -> Result<ChapterDisplay> {
    let mut display = ChapterDisplay {
        string: String::new(),
        languages: Vec::new(),
    };

    for child in Children::new(body) {
        let (id, data) = child?;
        match id {
            ids::CHAP_STRING => display.string = read_string(&data),
            ids::CHAP_LANGUAGE => display.languages.push(read_string(&data)),
            _ => {}
        }
    }

    Ok(display)
}

/// Parses the body of a `Chapters` element.
pub fn parse_chapters(body: Bytes) -> Result<Vec<EditionEntry>> {
    let mut editions = Vec::new();

    for child in Children::new(body) {
        let (id, data) = child?;
        if id != ids::EDITION_ENTRY {
            continue;
        }

        let mut edition = EditionEntry::default();
        for atom in Children::new(data) {
            let (id, data) = atom?;
            if id == ids::CHAPTER_ATOM {
                edition.atoms.push(ChapterAtom::parse(data)?);
            }
        }
        editions.push(edition);
    }

    Ok(editions)
}

#[cfg(test)]
#[cfg_attr(all(coverage_nightly, test), coverage(off))]
mod tests {
    use super::*;
    use crate::test_support::{master, string_element, uint_element};

    fn atom(start: u64, title: &str, extra: &[Vec<u8>]) -> Vec<u8> {
        let mut children = vec![
            uint_element(ids::CHAPTER_TIME_START, start),
            master(
                ids::CHAPTER_DISPLAY,
                &[
                    string_element(ids::CHAP_STRING, title),
                    string_element(ids::CHAP_LANGUAGE, "eng"),
                ],
            ),
        ];
        children.extend_from_slice(extra);
        master(ids::CHAPTER_ATOM, &children)
    }

    #[test]
    fn test_parse_chapters() {
        let edition = master(
            ids::EDITION_ENTRY,
            &[
                atom(0, "Intro", &[uint_element(ids::CHAPTER_UID, 7)]),
                atom(
                    90_000_000_000,
                    "Main",
                    &[
                        uint_element(ids::CHAPTER_FLAG_HIDDEN, 1),
                        atom(95_000_000_000, "Nested", &[]),
                    ],
                ),
            ],
        );

        let editions = parse_chapters(Bytes::from(edition)).unwrap();
        assert_eq!(editions.len(), 1);

        let atoms = &editions[0].atoms;
        assert_eq!(atoms.len(), 2);
        assert_eq!(atoms[0].uid, Some(7));
        assert_eq!(atoms[0].title(), Some("Intro"));
        assert!(atoms[0].enabled);
        assert_eq!(atoms[0].displays[0].languages, vec!["eng".to_string()]);

        assert_eq!(atoms[1].time_start, 90_000_000_000);
        assert!(atoms[1].hidden);
        assert_eq!(atoms[1].children.len(), 1);
        assert_eq!(atoms[1].children[0].title(), Some("Nested"));
    }
}
