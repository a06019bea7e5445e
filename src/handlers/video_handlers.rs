//! HTTP handlers for video upload, streaming and deletion.
//! Bodies are streamed in both directions; storage concerns live in
//! `VideoService`.

use crate::{
    errors::AppError,
    models::video::ObjectMetadata,
    services::video_service::{VideoSelector, VideoService, parse_video_id},
};
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use std::io;

/// Multipart form field carrying the video file.
const VIDEO_FIELD: &str = "video";
const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// `POST /upload` — store the `video` field of a multipart form.
pub async fn upload_video(
    State(service): State<VideoService>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("Unable to read video file: {}", err)))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or(VIDEO_FIELD).to_string();
        let stream = field.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
        let meta = service.upload(&filename, stream).await?;

        return Ok((
            StatusCode::OK,
            format!("Video uploaded successfully. File ID: {}", meta.id),
        ));
    }

    Err(AppError::bad_request(
        "Unable to read video file: missing `video` field",
    ))
}

/// `GET /video/{id}`
pub async fn get_video(
    State(service): State<VideoService>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_video_id(&id)?;
    stream_video(&service, VideoSelector::Id(id)).await
}

/// `GET /video/first` — the earliest uploaded video.
pub async fn get_first_video(State(service): State<VideoService>) -> Result<Response, AppError> {
    stream_video(&service, VideoSelector::Earliest).await
}

/// `GET /video/latest` — the most recently uploaded video.
pub async fn get_latest_video(State(service): State<VideoService>) -> Result<Response, AppError> {
    stream_video(&service, VideoSelector::Latest).await
}

/// `DELETE /video/{id}`
pub async fn delete_video(
    State(service): State<VideoService>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_video_id(&id)?;
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stream_video(
    service: &VideoService,
    selector: VideoSelector,
) -> Result<Response, AppError> {
    let handle = service.open(selector).await?;
    let meta = handle.metadata().clone();
    let body = Body::from_stream(handle.into_stream());

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_video_headers(response.headers_mut(), &meta);
    Ok(response)
}

fn set_video_headers(headers: &mut HeaderMap, meta: &ObjectMetadata) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(VIDEO_CONTENT_TYPE),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.length.max(0)));

    let quoted = format!("\"{}\"", meta.checksum);
    if let Ok(value) = HeaderValue::from_str(&quoted) {
        headers.insert(header::ETAG, value);
    }
}
