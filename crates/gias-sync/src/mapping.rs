//! [`GiasMapper`], the [`Mapper`] for GIAS records, and the helpers the cache
//! and lookup managers use to map with a management-group link.

use gias_core::{
  domain::{
    LearningProvider, ManagementGroup, ManagementGroupCode, ManagementGroupType,
  },
  mapping::{
    EnumerationName, MappedEntity, Mapper, SourceEntity, TargetKind, Translator,
  },
  model::{CodeNamePair, Entity, Establishment, Group, LocalAuthority},
};
use thiserror::Error;

use crate::{BoxError, Error, Result};

#[derive(Debug, Error)]
pub enum MappingError {
  #[error(transparent)]
  Core(#[from] gias_core::Error),

  #[error("translation failed: {0}")]
  Translation(#[source] BoxError),
}

// ─── Mapper ───────────────────────────────────────────────────────────────────

/// Maps establishments to learning providers and groups / local authorities
/// to management groups, translating code values through `T`.
///
/// An establishment's management group defaults to its local authority; the
/// cache manager overrides it when the establishment belongs to a group.
#[derive(Debug, Clone)]
pub struct GiasMapper<T> {
  translator: T,
}

impl<T: Translator> GiasMapper<T> {
  pub fn new(translator: T) -> Self { Self { translator } }

  async fn translate(
    &self,
    enumeration: EnumerationName,
    value: Option<&CodeNamePair>,
  ) -> Result<Option<String>, MappingError> {
    let Some(pair) = value else { return Ok(None) };
    let translated = self
      .translator
      .translate(enumeration, &pair.code)
      .await
      .map_err(|e| MappingError::Translation(Box::new(e)))?;
    if translated.is_none() {
      tracing::debug!(%enumeration, code = %pair.code, "no translation for code");
    }
    Ok(translated)
  }

  async fn learning_provider(
    &self,
    e: &Establishment,
  ) -> Result<LearningProvider, MappingError> {
    let management_group = e
      .local_authority_code
      .map(|code| local_authority_group(code, e.local_authority_name.as_deref()));

    Ok(LearningProvider {
      urn: e.urn,
      ukprn: e.ukprn,
      uprn: e.uprn.clone(),
      name: e.name.clone(),
      establishment_number: e.establishment_number,
      provider_type: self
        .translate(EnumerationName::ProviderType, e.establishment_type.as_ref())
        .await?,
      provider_type_group: self
        .translate(
          EnumerationName::ProviderTypeGroup,
          e.establishment_type_group.as_ref(),
        )
        .await?,
      provider_status: self
        .translate(EnumerationName::ProviderStatus, e.establishment_status.as_ref())
        .await?,
      phase_of_education: self
        .translate(EnumerationName::PhaseOfEducation, e.phase_of_education.as_ref())
        .await?,
      open_date: e.open_date,
      close_date: e.close_date,
      statutory_low_age: e.statutory_low_age,
      statutory_high_age: e.statutory_high_age,
      local_authority_code: e.local_authority_code,
      companies_house_number: e.companies_house_number.clone(),
      charities_commission_number: e.charities_commission_number.clone(),
      address: e.address.clone(),
      website: e.website.clone(),
      telephone: e.telephone.clone(),
      management_group,
    })
  }

  async fn group(&self, g: &Group) -> Result<ManagementGroup, MappingError> {
    let group_type = g
      .group_type
      .as_ref()
      .and_then(|t| ManagementGroupType::from_group_type_code(&t.code))
      .ok_or_else(|| gias_core::Error::UnsupportedGroupType {
        uid:        g.uid,
        group_type: g.group_type.as_ref().map(|t| t.code.clone()),
      })?;

    Ok(ManagementGroup {
      code: ManagementGroupCode::new(group_type, g.uid).to_string(),
      group_type,
      type_name: group_type.display_name().to_owned(),
      identifier: g.uid.to_string(),
      name: g.name.clone(),
      status: self
        .translate(EnumerationName::ManagementGroupStatus, g.status.as_ref())
        .await?,
      companies_house_number: g.companies_house_number.clone(),
      ukprn: g.ukprn,
      open_date: g.open_date,
      close_date: g.closed_date,
      address: Some(g.address.clone()),
    })
  }
}

impl<T: Translator> Mapper for GiasMapper<T> {
  type Error = MappingError;

  async fn map<'a>(
    &'a self,
    source: SourceEntity<'a>,
    target: TargetKind,
  ) -> Result<MappedEntity, MappingError> {
    match (source, target) {
      (SourceEntity::Establishment(e), TargetKind::LearningProvider) => {
        Ok(MappedEntity::LearningProvider(self.learning_provider(e).await?))
      }
      (SourceEntity::Group(g), TargetKind::ManagementGroup) => {
        Ok(MappedEntity::ManagementGroup(self.group(g).await?))
      }
      (SourceEntity::LocalAuthority(la), TargetKind::ManagementGroup) => Ok(
        MappedEntity::ManagementGroup(local_authority_group(la.code, Some(&la.name))),
      ),
      (source, target) => Err(
        gias_core::Error::UnsupportedMapping {
          entity_type: source.entity_type(),
          target,
        }
        .into(),
      ),
    }
  }
}

fn local_authority_group(code: i64, name: Option<&str>) -> ManagementGroup {
  let group_type = ManagementGroupType::LocalAuthority;
  ManagementGroup {
    code: ManagementGroupCode::new(group_type, code).to_string(),
    group_type,
    type_name: group_type.display_name().to_owned(),
    identifier: code.to_string(),
    name: name.unwrap_or_default().to_owned(),
    status: None,
    companies_house_number: None,
    ukprn: None,
    open_date: None,
    close_date: None,
    address: None,
  }
}

// ─── Helpers shared by the managers ───────────────────────────────────────────

/// Map any entity to its public shape, checking the mapper honoured the
/// requested target.
pub(crate) async fn map_entity<M: Mapper, T: Entity>(
  mapper: &M,
  entity: &T,
) -> Result<MappedEntity> {
  let mapped = mapper
    .map(entity.as_source(), T::TARGET)
    .await
    .map_err(|e| Error::Mapping(Box::new(e)))?;
  if mapped.kind() != T::TARGET {
    return Err(Error::UnexpectedMapping {
      expected: T::TARGET,
      actual:   mapped.kind(),
    });
  }
  Ok(mapped)
}

/// Map an establishment, replacing its default link with `link` when given.
pub(crate) async fn map_learning_provider<M: Mapper>(
  mapper: &M,
  establishment: &Establishment,
  link: Option<&ManagementGroup>,
) -> Result<LearningProvider> {
  let mut provider = map_entity(mapper, establishment)
    .await?
    .into_learning_provider()
    .ok_or(Error::UnexpectedMapping {
      expected: TargetKind::LearningProvider,
      actual:   TargetKind::ManagementGroup,
    })?;
  if let Some(link) = link {
    provider.management_group = Some(link.clone());
  }
  Ok(provider)
}

pub(crate) async fn map_management_group<M: Mapper, T: Entity>(
  mapper: &M,
  entity: &T,
) -> Result<ManagementGroup> {
  map_entity(mapper, entity)
    .await?
    .into_management_group()
    .ok_or(Error::UnexpectedMapping {
      expected: TargetKind::ManagementGroup,
      actual:   TargetKind::LearningProvider,
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
