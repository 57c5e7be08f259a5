use bytes::Bytes;

use crate::ebml::{Children, read_string, read_uint};
use crate::error::Result;
use crate::ids;

/// Target type value of tags that apply to the whole album or movie.
pub const TARGET_TYPE_ALBUM: u64 = 50;

/// Target type value of tags that apply to a track, song or chapter.
pub const TARGET_TYPE_TRACK: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub targets: TagTargets,
    pub simple_tags: Vec<SimpleTag>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTargets {
    pub type_value: u64,
    pub target_type: Option<String>,
    pub track_uids: Vec<u64>,
    pub chapter_uids: Vec<u64>,
}

impl Default for TagTargets {
    fn default() -> Self {
        Self {
            type_value: TARGET_TYPE_ALBUM,
            target_type: None,
            track_uids: Vec::new(),
            chapter_uids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleTag {
    pub name: String,
    pub value: Option<String>,
    pub language: Option<String>,
    pub children: Vec<SimpleTag>,
}

impl Tag {
    /// Value of the first simple tag named `name`, case-insensitively.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.simple_tags
            .iter()
            .find(|tag| tag.name.eq_ignore_ascii_case(name))
            .and_then(|tag| tag.value.as_deref())
    }

    fn parse(body: Bytes) -> Result<Self> {
        let mut tag = Tag {
            targets: TagTargets::default(),
            simple_tags: Vec::new(),
        };

        for child in Children::new(body) {
            let (id, data) = child?;
            match id {
                ids::TARGETS => tag.targets = parse_targets(data)?,
                ids::SIMPLE_TAG => tag.simple_tags.push(parse_simple_tag(data)?),
                _ => {}
            }
        }

        Ok(tag)
    }
}

fn parse_targets(body: Bytes) -> Result<TagTargets> {
    let mut targets = TagTargets::default();
    for child in Children::new(body) {
        let (id, data) = child?;
        match id {
            ids::TARGET_TYPE_VALUE => targets.type_value = read_uint(id, &data)?,
            ids::TARGET_TYPE => targets.target_type = Some(read_string(&data)),
            ids::TAG_TRACK_UID => targets.track_uids.push(read_uint(id, &data)?),
            ids::TAG_CHAPTER_UID => targets.chapter_uids.push(read_uint(id, &data)?),
            _ => {}
        }
    }
    Ok(targets)
}

fn parse_simple_tag(body: Bytes) -> Result<SimpleTag> {
    let mut simple = SimpleTag {
        name: String::new(),
        value: None,
        language: None,
        children: Vec::new(),
    };

    for child in Children::new(body) {
        let (id, data) = child?;
        match id {
            ids::TAG_NAME => simple.name = read_string(&data),
            ids::TAG_STRING => simple.value = Some(read_string(&data)),
            ids::TAG_LANGUAGE => simple.language = Some(read_string(&data)),
            ids::SIMPLE_TAG => simple.children.push(parse_simple_tag(data)?),
            _ => {}
        }
    }

    Ok(simple)
}

/// Parses the body of a `Tags` element.
pub fn parse_tags(body: Bytes) -> Result<Vec<Tag>> {
    let mut tags = Vec::new();
    for child in Children::new(body) {
        let (id, data) = child?;
        if id == ids::TAG {
            tags.push(Tag::parse(data)?);
        }
    }
    Ok(tags)
}
