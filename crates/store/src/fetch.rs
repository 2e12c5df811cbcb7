//! Read queries shared by the pool-level [`Repository`](crate::Repository)
//! and the transaction-level [`Reconciler`](crate::Reconciler).

use crate::error::{ErrorKind, Result};
use crate::models::{
    File, FileRow, Project, ProjectRow, RequirementRow, Requirements, Version, VersionRow,
};
use exn::ResultExt;
use sqlx::SqliteExecutor;

pub(crate) async fn project<'e>(executor: impl SqliteExecutor<'e>, normalized: &str) -> Result<Option<Project>> {
    let row: Option<ProjectRow> = sqlx::query_as(include_str!("../queries/get_project.sql"))
        .bind(normalized)
        .fetch_optional(executor)
        .await
        .or_raise(|| ErrorKind::Database)?;
    row.map(Project::try_from).transpose()
}

pub(crate) async fn live_projects<'e>(executor: impl SqliteExecutor<'e>) -> Result<Vec<Project>> {
    let rows: Vec<ProjectRow> = sqlx::query_as(include_str!("../queries/list_live_projects.sql"))
        .fetch_all(executor)
        .await
        .or_raise(|| ErrorKind::Database)?;
    rows.into_iter().map(Project::try_from).collect()
}

pub(crate) async fn version<'e>(
    executor: impl SqliteExecutor<'e>,
    project_id: i64,
    version: &str,
) -> Result<Option<Version>> {
    let row: Option<VersionRow> = sqlx::query_as(include_str!("../queries/get_version.sql"))
        .bind(project_id)
        .bind(version)
        .fetch_optional(executor)
        .await
        .or_raise(|| ErrorKind::Database)?;
    row.map(Version::try_from).transpose()
}

pub(crate) async fn versions<'e>(executor: impl SqliteExecutor<'e>, project_id: i64) -> Result<Vec<Version>> {
    let rows: Vec<VersionRow> = sqlx::query_as(include_str!("../queries/list_versions.sql"))
        .bind(project_id)
        .fetch_all(executor)
        .await
        .or_raise(|| ErrorKind::Database)?;
    rows.into_iter().map(Version::try_from).collect()
}

pub(crate) async fn file<'e>(executor: impl SqliteExecutor<'e>, filename: &str) -> Result<Option<File>> {
    let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_file.sql"))
        .bind(filename)
        .fetch_optional(executor)
        .await
        .or_raise(|| ErrorKind::Database)?;
    row.map(File::try_from).transpose()
}

pub(crate) async fn files<'e>(executor: impl SqliteExecutor<'e>, version_id: i64) -> Result<Vec<File>> {
    let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_files.sql"))
        .bind(version_id)
        .fetch_all(executor)
        .await
        .or_raise(|| ErrorKind::Database)?;
    rows.into_iter().map(File::try_from).collect()
}

pub(crate) async fn requirements<'e>(executor: impl SqliteExecutor<'e>, version_id: i64) -> Result<Requirements> {
    let rows: Vec<RequirementRow> = sqlx::query_as(include_str!("../queries/list_requirements.sql"))
        .bind(version_id)
        .fetch_all(executor)
        .await
        .or_raise(|| ErrorKind::Database)?;
    Requirements::from_rows(rows)
}

/// Troves linked to a version, sorted.
pub(crate) async fn version_classifiers<'e>(executor: impl SqliteExecutor<'e>, version_id: i64) -> Result<Vec<String>> {
    let rows: Vec<crate::models::ClassifierRow> =
        sqlx::query_as(include_str!("../queries/list_version_classifiers.sql"))
            .bind(version_id)
            .fetch_all(executor)
            .await
            .or_raise(|| ErrorKind::Database)?;
    Ok(rows.into_iter().map(|classifier| classifier.trove).collect())
}
