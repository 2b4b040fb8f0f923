use serde_json::{json, Value};

fn json_content(schema: Value) -> Value {
    json!({ "application/json": { "schema": schema } })
}

fn reference(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": json_content(reference("ErrorResponse"))
    })
}

fn id_parameter() -> Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "string", "format": "uuid" }
    })
}

fn query_parameter(name: &str, kind: &str, description: &str) -> Value {
    json!({
        "name": name,
        "in": "query",
        "required": false,
        "description": description,
        "schema": { "type": kind }
    })
}

/// OpenAPI fragment for the books module; paths are relative to `/api/books`.
pub(super) fn document() -> Value {
    json!({
        "paths": {
            "/": collection_path(),
            "/search": search_path(),
            "/filter": filter_path(),
            "/sidebar": sidebar_path(),
            "/{id}": item_path()
        },
        "components": {
            "schemas": schemas()
        }
    })
}

fn book_list() -> Value {
    json!({ "type": "array", "items": reference("Book") })
}

fn one_or_many(name: &str) -> Value {
    json!({
        "oneOf": [
            reference(name),
            { "type": "array", "items": reference(name) }
        ]
    })
}

fn collection_path() -> Value {
    json!({
        "get": {
            "summary": "List books",
            "tags": ["Books"],
            "responses": {
                "200": { "description": "All books", "content": json_content(book_list()) },
                "500": error_response("Internal server error")
            }
        },
        "post": {
            "summary": "Create one book or a batch",
            "tags": ["Books"],
            "requestBody": { "required": true, "content": json_content(one_or_many("BookInput")) },
            "responses": {
                "201": { "description": "Created", "content": json_content(one_or_many("Book")) },
                "400": error_response("Validation error")
            }
        }
    })
}

fn search_path() -> Value {
    json!({
        "get": {
            "summary": "Search title, author and genre",
            "tags": ["Books"],
            "parameters": [
                {
                    "name": "query",
                    "in": "query",
                    "required": true,
                    "description": "Case-insensitive substring",
                    "schema": { "type": "string" }
                }
            ],
            "responses": {
                "200": { "description": "Matching books", "content": json_content(book_list()) },
                "400": error_response("Missing query")
            }
        }
    })
}

fn filter_path() -> Value {
    let parameters = vec![
        query_parameter("author", "string", "Case-insensitive substring"),
        query_parameter("genre", "string", "Exact genre"),
        query_parameter("year", "integer", "Exact publication year"),
        query_parameter("page", "integer", "1-based page, default 1"),
        query_parameter("limit", "integer", "Page size, default 10"),
        query_parameter("sort", "string", "Field name, prefix with '-' for descending"),
    ];

    json!({
        "get": {
            "summary": "Filter by author, genre or year",
            "tags": ["Books"],
            "parameters": parameters,
            "responses": {
                "200": { "description": "One page of results", "content": json_content(reference("BookPage")) },
                "400": error_response("No filter field or invalid parameter")
            }
        }
    })
}

fn sidebar_path() -> Value {
    json!({
        "get": {
            "summary": "Author, genre and year facets",
            "tags": ["Books"],
            "responses": {
                "200": { "description": "Facets", "content": json_content(reference("Sidebar")) },
                "500": error_response("Internal server error")
            }
        }
    })
}

fn item_path() -> Value {
    let deleted = json!({
        "type": "object",
        "properties": { "message": { "type": "string" } }
    });

    json!({
        "get": {
            "summary": "Get a book",
            "tags": ["Books"],
            "parameters": [id_parameter()],
            "responses": {
                "200": { "description": "The book", "content": json_content(reference("Book")) },
                "400": error_response("Malformed id"),
                "404": error_response("Book not found")
            }
        },
        "put": {
            "summary": "Update some fields of a book",
            "tags": ["Books"],
            "parameters": [id_parameter()],
            "requestBody": { "required": true, "content": json_content(reference("BookPatch")) },
            "responses": {
                "200": { "description": "The updated book", "content": json_content(reference("Book")) },
                "400": error_response("Validation error or malformed id"),
                "404": error_response("Book not found")
            }
        },
        "delete": {
            "summary": "Delete a book",
            "tags": ["Books"],
            "parameters": [id_parameter()],
            "responses": {
                "200": { "description": "Deleted", "content": json_content(deleted) },
                "400": error_response("Malformed id"),
                "404": error_response("Book not found")
            }
        }
    })
}

fn book_fields() -> Value {
    json!({
        "title": { "type": "string" },
        "author": { "type": "string" },
        "genre": { "type": "string" },
        "publishedYear": { "type": "integer" }
    })
}

fn schemas() -> Value {
    let mut book = book_fields();
    book["id"] = json!({ "type": "string", "format": "uuid" });
    book["createdAt"] = json!({ "type": "string", "format": "date-time" });
    book["updatedAt"] = json!({ "type": "string", "format": "date-time" });

    let facet = json!({
        "type": "object",
        "properties": {
            "name": { "oneOf": [{ "type": "string" }, { "type": "integer" }] },
            "count": { "type": "integer" }
        }
    });
    let page = json!({
        "type": "object",
        "properties": {
            "page": { "type": "integer" },
            "limit": { "type": "integer" },
            "total": { "type": "integer" },
            "totalPages": { "type": "integer" },
            "results": book_list()
        }
    });
    let sidebar = json!({
        "type": "object",
        "properties": {
            "authors": { "type": "array", "items": reference("Facet") },
            "genres": { "type": "array", "items": reference("Facet") },
            "years": { "type": "array", "items": reference("Facet") }
        }
    });

    json!({
        "Book": {
            "type": "object",
            "properties": book,
            "required": ["id", "title", "author", "genre", "publishedYear", "createdAt", "updatedAt"]
        },
        "BookInput": {
            "type": "object",
            "properties": book_fields(),
            "required": ["title", "author", "genre", "publishedYear"]
        },
        "BookPatch": { "type": "object", "properties": book_fields() },
        "BookPage": page,
        "Facet": facet,
        "Sidebar": sidebar
    })
}
