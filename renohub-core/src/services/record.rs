//! Record service - renovation records with their rooms and tags

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{RenovationRecord, Room, Tag};
use crate::ports::Repository;
use crate::services::moderation::ModerationService;
use crate::services::pagination::Page;
use crate::services::storage::{ImageKind, ImageStore};
use crate::validation::common::fold;
use crate::validation::tag::TAG_PROFANE;
use crate::validation::{
    normalize_tag, validate_record, validate_room_name, validate_tag, Field, RecordForm,
    ValidationErrors,
};

pub const NAME_PROFANE: &str = "Name contains inappropriate language";
pub const DESCRIPTION_PROFANE: &str = "Description contains inappropriate language";
pub const ROOM_PROFANE: &str = "Room name contains inappropriate language";

/// Load a record and check it belongs to `owner`
pub(crate) fn owned_record(
    repository: &dyn Repository,
    owner: Uuid,
    record_id: Uuid,
) -> Result<RenovationRecord> {
    let record = repository
        .get_record(record_id)?
        .ok_or_else(|| Error::not_found(format!("Renovation record {}", record_id)))?;
    if !record.is_owned_by(owner) {
        return Err(Error::forbidden("You do not own this renovation record"));
    }
    Ok(record)
}

/// A record with everything shown on its page
#[derive(Debug, Clone, Serialize)]
pub struct RecordDetails {
    pub record: RenovationRecord,
    pub rooms: Vec<Room>,
    pub tags: Vec<Tag>,
}

/// Filters for browsing public records
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    /// Matched against name and description, ignoring case and accents
    pub keyword: Option<String>,
    pub tag: Option<String>,
    pub city: Option<String>,
}

pub struct RecordService {
    repository: Arc<dyn Repository>,
    moderation: Arc<ModerationService>,
    images: Arc<ImageStore>,
    page_size: usize,
}

impl RecordService {
    pub fn new(
        repository: Arc<dyn Repository>,
        moderation: Arc<ModerationService>,
        images: Arc<ImageStore>,
        page_size: usize,
    ) -> Self {
        Self {
            repository,
            moderation,
            images,
            page_size,
        }
    }

    /// Names of the owner's records other than `except`
    fn other_names(&self, owner: Uuid, except: Option<Uuid>) -> Result<Vec<String>> {
        Ok(self
            .repository
            .list_records_by_owner(owner)?
            .into_iter()
            .filter(|r| Some(r.id) != except)
            .map(|r| r.name)
            .collect())
    }

    fn moderate(&self, name: &str, description: &str) -> Result<()> {
        let mut errors = ValidationErrors::new();
        self.moderation.flag(&mut errors, Field::Name, name, NAME_PROFANE)?;
        self.moderation
            .flag(&mut errors, Field::Description, description, DESCRIPTION_PROFANE)?;
        errors.into_result(()).map_err(Error::from)
    }

    pub fn create_record(&self, owner: Uuid, form: &RecordForm) -> Result<RenovationRecord> {
        let parsed = validate_record(form, &self.other_names(owner, None)?)?;
        self.moderate(&parsed.name, &parsed.description)?;

        let record = RenovationRecord::new(owner, parsed.name, parsed.description, parsed.location);
        self.repository.save_record(&record)?;
        Ok(record)
    }

    pub fn update_record(&self, owner: Uuid, record_id: Uuid, form: &RecordForm) -> Result<RenovationRecord> {
        let mut record = owned_record(self.repository.as_ref(), owner, record_id)?;
        let parsed = validate_record(form, &self.other_names(owner, Some(record_id))?)?;
        self.moderate(&parsed.name, &parsed.description)?;

        record.name = parsed.name;
        record.description = parsed.description;
        record.location = parsed.location;
        self.repository.save_record(&record)?;
        Ok(record)
    }

    /// Delete a record with its rooms, tags, jobs and their dependents
    pub fn delete_record(&self, owner: Uuid, record_id: Uuid) -> Result<()> {
        owned_record(self.repository.as_ref(), owner, record_id)?;
        self.repository.delete_record(record_id)
    }

    /// A record as seen by `viewer`; private records only by their owner
    pub fn get_record(&self, viewer: Option<Uuid>, record_id: Uuid) -> Result<RecordDetails> {
        let record = self
            .repository
            .get_record(record_id)?
            .ok_or_else(|| Error::not_found(format!("Renovation record {}", record_id)))?;
        if !record.is_public && viewer != Some(record.owner_id) {
            return Err(Error::forbidden("This renovation record is private"));
        }

        Ok(RecordDetails {
            rooms: self.repository.list_rooms(record_id)?,
            tags: self.repository.list_tags(record_id)?,
            record,
        })
    }

    pub fn list_records(&self, owner: Uuid, page: usize) -> Result<Page<RenovationRecord>> {
        let records = self.repository.list_records_by_owner(owner)?;
        Ok(Page::paginate(records, page, self.page_size))
    }

    pub fn set_public(&self, owner: Uuid, record_id: Uuid, is_public: bool) -> Result<RenovationRecord> {
        let mut record = owned_record(self.repository.as_ref(), owner, record_id)?;
        record.is_public = is_public;
        self.repository.save_record(&record)?;
        Ok(record)
    }

    pub fn search_public_records(&self, query: &RecordQuery, page: usize) -> Result<Page<RenovationRecord>> {
        let keyword = query
            .keyword
            .as_deref()
            .map(fold)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let tag = query
            .tag
            .as_deref()
            .map(normalize_tag)
            .filter(|t| !t.is_empty());
        let city = query
            .city
            .as_deref()
            .map(fold)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let mut matches = Vec::new();
        for record in self.repository.list_public_records()? {
            if let Some(k) = &keyword {
                if !fold(&record.name).contains(k.as_str()) && !fold(&record.description).contains(k.as_str()) {
                    continue;
                }
            }
            if let Some(c) = &city {
                if fold(record.location.city.trim()) != *c {
                    continue;
                }
            }
            if let Some(t) = &tag {
                if !self.repository.list_tags(record.id)?.iter().any(|x| &x.name == t) {
                    continue;
                }
            }
            matches.push(record);
        }

        Ok(Page::paginate(matches, page, self.page_size))
    }

    // === Rooms ===

    pub fn list_rooms(&self, record_id: Uuid) -> Result<Vec<Room>> {
        self.repository.list_rooms(record_id)
    }

    pub fn add_room(&self, owner: Uuid, record_id: Uuid, name: &str) -> Result<Room> {
        owned_record(self.repository.as_ref(), owner, record_id)?;
        let existing: Vec<String> = self
            .repository
            .list_rooms(record_id)?
            .into_iter()
            .map(|r| r.name)
            .collect();
        let name = validate_room_name(name, &existing)?;

        let mut errors = ValidationErrors::new();
        self.moderation.flag(&mut errors, Field::Room, &name, ROOM_PROFANE)?;
        errors.into_result(())?;

        let room = Room::new(record_id, name);
        self.repository.save_room(&room)?;
        Ok(room)
    }

    fn owned_room(&self, owner: Uuid, room_id: Uuid) -> Result<Room> {
        let room = self
            .repository
            .get_room(room_id)?
            .ok_or_else(|| Error::not_found(format!("Room {}", room_id)))?;
        owned_record(self.repository.as_ref(), owner, room.record_id)?;
        Ok(room)
    }

    pub fn remove_room(&self, owner: Uuid, room_id: Uuid) -> Result<()> {
        let room = self.owned_room(owner, room_id)?;
        self.repository.delete_room(room_id)?;
        if let Some(image) = &room.image {
            self.images.remove(image)?;
        }
        Ok(())
    }

    pub fn set_room_image(&self, owner: Uuid, room_id: Uuid, filename: &str, bytes: &[u8]) -> Result<Room> {
        let mut room = self.owned_room(owner, room_id)?;
        let previous = room.image.clone();
        self.images.replace(
            ImageKind::Room,
            room_id,
            filename,
            bytes,
            previous.as_deref(),
            |stored| {
                room.image = Some(stored);
                self.repository.save_room(&room)
            },
        )?;
        Ok(room)
    }

    // === Tags ===

    pub fn list_tags(&self, record_id: Uuid) -> Result<Vec<Tag>> {
        self.repository.list_tags(record_id)
    }

    /// Normalize, validate and moderate a tag, then attach it
    pub fn add_tag(&self, owner: Uuid, record_id: Uuid, raw: &str) -> Result<Tag> {
        owned_record(self.repository.as_ref(), owner, record_id)?;
        let existing = self.repository.list_tags(record_id)?;
        let name = validate_tag(raw, &existing)?;

        let mut errors = ValidationErrors::new();
        self.moderation.flag(&mut errors, Field::Tag, &name, TAG_PROFANE)?;
        errors.into_result(())?;

        let tag = Tag::new(record_id, name);
        self.repository.save_tag(&tag)?;
        Ok(tag)
    }

    pub fn remove_tag(&self, owner: Uuid, record_id: Uuid, raw: &str) -> Result<()> {
        owned_record(self.repository.as_ref(), owner, record_id)?;
        let name = normalize_tag(raw);
        if !self.repository.delete_tag(record_id, &name)? {
            return Err(Error::not_found(format!("Tag '{}'", name)));
        }
        Ok(())
    }
}
