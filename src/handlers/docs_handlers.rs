//! API documentation.
//!
//! - GET /docs/openapi.json -> OpenAPI 3 description of every route

use axum::Json;
use serde_json::{Value, json};

/// `GET /docs/openapi.json`
pub async fn openapi_json() -> Json<Value> {
    Json(openapi_document())
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": { "schema": { "$ref": "#/components/schemas/Error" } }
        }
    })
}

fn video_response() -> Value {
    json!({
        "description": "Video streamed successfully",
        "headers": {
            "ETag": { "description": "MD5 of the video content", "schema": { "type": "string" } }
        },
        "content": {
            "video/mp4": { "schema": { "type": "string", "format": "binary" } }
        }
    })
}

fn video_id_param() -> Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "description": "Video ID",
        "schema": { "type": "string", "format": "uuid" }
    })
}

fn users_path() -> Value {
    json!({
        "get": {
            "summary": "Get users",
            "tags": ["users"],
            "responses": {
                "200": {
                    "description": "OK",
                    "content": {
                        "application/json": {
                            "schema": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/User" }
                            }
                        }
                    }
                },
                "500": error_response("Failed to list users")
            }
        },
        "post": {
            "summary": "Create user",
            "tags": ["users"],
            "requestBody": {
                "required": true,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/NewUser" }
                    }
                }
            },
            "responses": {
                "201": {
                    "description": "Created",
                    "content": {
                        "application/json": {
                            "schema": { "$ref": "#/components/schemas/User" }
                        }
                    }
                },
                "400": error_response("Invalid request body"),
                "500": error_response("Failed to create user")
            }
        }
    })
}

fn login_path() -> Value {
    json!({
        "post": {
            "summary": "Login user",
            "description": "Authenticate a user by username and password",
            "tags": ["users"],
            "requestBody": {
                "required": true,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/LoginCredentials" }
                    }
                }
            },
            "responses": {
                "200": {
                    "description": "OK",
                    "content": {
                        "application/json": {
                            "schema": { "$ref": "#/components/schemas/User" }
                        }
                    }
                },
                "400": error_response("Invalid request body"),
                "401": error_response("Invalid username or password")
            }
        }
    })
}

fn upload_path() -> Value {
    json!({
        "post": {
            "summary": "Upload a video",
            "tags": ["videos"],
            "requestBody": {
                "required": true,
                "content": {
                    "multipart/form-data": {
                        "schema": {
                            "type": "object",
                            "required": ["video"],
                            "properties": {
                                "video": { "type": "string", "format": "binary" }
                            }
                        }
                    }
                }
            },
            "responses": {
                "200": {
                    "description": "Video uploaded successfully",
                    "content": { "text/plain": { "schema": { "type": "string" } } }
                },
                "400": error_response("Unable to read video file"),
                "500": error_response("Unable to upload video")
            }
        }
    })
}

fn first_video_path() -> Value {
    json!({
        "get": {
            "summary": "Stream the earliest video",
            "tags": ["videos"],
            "responses": {
                "200": video_response(),
                "404": error_response("No video found"),
                "500": error_response("Failed to stream video")
            }
        }
    })
}

fn latest_video_path() -> Value {
    json!({
        "get": {
            "summary": "Stream the most recent video",
            "tags": ["videos"],
            "responses": {
                "200": video_response(),
                "404": error_response("No video found"),
                "500": error_response("Failed to stream video")
            }
        }
    })
}

fn video_by_id_path() -> Value {
    json!({
        "get": {
            "summary": "Stream a video",
            "tags": ["videos"],
            "parameters": [video_id_param()],
            "responses": {
                "200": video_response(),
                "400": error_response("Malformed video id"),
                "404": error_response("Video not found"),
                "500": error_response("Failed to stream video")
            }
        },
        "delete": {
            "summary": "Delete a video",
            "tags": ["videos"],
            "parameters": [video_id_param()],
            "responses": {
                "204": { "description": "Deleted" },
                "400": error_response("Malformed video id"),
                "404": error_response("Video not found"),
                "500": error_response("Failed to delete video")
            }
        }
    })
}

fn healthz_path() -> Value {
    json!({
        "get": {
            "summary": "Liveness",
            "tags": ["health"],
            "responses": { "200": { "description": "OK" } }
        }
    })
}

fn readyz_path() -> Value {
    json!({
        "get": {
            "summary": "Readiness",
            "tags": ["health"],
            "responses": {
                "200": { "description": "Ready" },
                "503": { "description": "A backing store is unreachable" }
            }
        }
    })
}

/// The document served at `/docs/openapi.json`.
pub fn openapi_document() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Video hub API",
            "description": "User registration and chunked video upload and streaming.",
            "version": env!("CARGO_PKG_VERSION")
        },
        "paths": {
            "/users": users_path(),
            "/login": login_path(),
            "/upload": upload_path(),
            "/video/first": first_video_path(),
            "/video/latest": latest_video_path(),
            "/video/{id}": video_by_id_path(),
            "/healthz": healthz_path(),
            "/readyz": readyz_path()
        },
        "components": {
            "schemas": {
                "User": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "name": { "type": "string" },
                        "username": { "type": "string" },
                        "createdAt": { "type": "string", "format": "date-time" }
                    }
                },
                "NewUser": {
                    "type": "object",
                    "required": ["name", "username", "password"],
                    "properties": {
                        "name": { "type": "string" },
                        "username": { "type": "string" },
                        "password": { "type": "string" }
                    }
                },
                "LoginCredentials": {
                    "type": "object",
                    "required": ["username", "password"],
                    "properties": {
                        "username": { "type": "string" },
                        "password": { "type": "string" }
                    }
                },
                "Error": {
                    "type": "object",
                    "properties": {
                        "error": { "type": "string" },
                        "status": { "type": "integer" }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = openapi_document();
        let paths = doc["paths"].as_object().unwrap();
        for (path, method) in [
            ("/users", "get"),
            ("/users", "post"),
            ("/login", "post"),
            ("/upload", "post"),
            ("/video/first", "get"),
            ("/video/latest", "get"),
            ("/video/{id}", "get"),
            ("/video/{id}", "delete"),
            ("/healthz", "get"),
            ("/readyz", "get"),
        ] {
            assert!(paths[path].get(method).is_some(), "{method} {path} undocumented");
        }
    }
}
