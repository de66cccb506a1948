use crate::error::{Error, Result};
use crate::models::{ActorId, CouncilControlDeclaration, ReviewStatus};
use crate::review::effective_source;

/// Exactly one of a controlling party or "no overall control" must be given.
pub fn validate_control(declaration: &CouncilControlDeclaration) -> Result<()> {
    if declaration.controlling_party.is_some() == declaration.no_overall_control {
        return Err(Error::AmbiguousControl(declaration.contest_id.clone()));
    }
    if declaration.source.trim().is_empty() {
        return Err(Error::MissingProvenance(format!(
            "council control for {}",
            declaration.contest_id
        )));
    }
    Ok(())
}

pub fn begin_control_review(
    declaration: &CouncilControlDeclaration,
    actor: &ActorId,
) -> Result<CouncilControlDeclaration> {
    if declaration.review_status == ReviewStatus::Confirmed {
        return Err(Error::AlreadyConfirmed(format!(
            "council control for {}",
            declaration.contest_id
        )));
    }

    let mut next = declaration.clone();
    next.review_status = ReviewStatus::UnderReview;
    next.reviewed_by = Some(actor.clone());
    Ok(next)
}

pub fn confirm_control(
    declaration: &CouncilControlDeclaration,
    actor: &ActorId,
    review_source: Option<&str>,
) -> Result<CouncilControlDeclaration> {
    let source = effective_source(review_source, &declaration.source);

    if declaration.review_status == ReviewStatus::Confirmed {
        let stored = effective_source(declaration.review_source.as_deref(), &declaration.source);
        if declaration.reviewed_by.as_ref() == Some(actor) && stored == source {
            return Ok(declaration.clone());
        }
        return Err(Error::AlreadyConfirmed(format!(
            "council control for {}",
            declaration.contest_id
        )));
    }

    validate_control(declaration)?;
    let source = source.ok_or_else(|| {
        Error::MissingProvenance(format!("council control for {}", declaration.contest_id))
    })?;

    let mut next = declaration.clone();
    next.review_status = ReviewStatus::Confirmed;
    next.reviewed_by = Some(actor.clone());
    next.review_source = Some(source.to_string());
    Ok(next)
}
