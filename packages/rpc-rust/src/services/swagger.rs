//! OpenAPI documents generated from command sets.

use switchyard_core::{ApplicationError, CommandSet, ObjectSchema, TypeCode};
use utoipa::openapi::path::{HttpMethod, OperationBuilder, ParameterBuilder, ParameterIn};
use utoipa::openapi::request_body::RequestBodyBuilder;
use utoipa::openapi::schema::{ObjectBuilder, SchemaType, Type};
use utoipa::openapi::{
    ContentBuilder, InfoBuilder, OpenApiBuilder, PathItem, PathsBuilder, RefOr, Required,
    ResponseBuilder, Schema,
};

use super::request::CORRELATION_ID;
use super::rest_service::append_base_route;

const JSON: &str = "application/json";

/// Describes every command of `commands` as `POST {base_route}/{name}`.
///
/// # Errors
///
/// Returns `SERIALIZATION_FAILED` if the document cannot be rendered.
pub fn command_set_to_open_api(
    title: &str,
    base_route: &str,
    commands: &CommandSet,
) -> Result<String, ApplicationError> {
    let tag = base_route.trim_matches('/');
    let tag = if tag.is_empty() { title } else { tag };

    let mut paths = PathsBuilder::new();
    for command in commands.commands() {
        let mut operation = OperationBuilder::new()
            .tag(tag)
            .operation_id(Some(command.name()))
            .parameter(
                ParameterBuilder::new()
                    .name(CORRELATION_ID)
                    .parameter_in(ParameterIn::Query)
                    .required(Required::False)
                    .schema(Some(type_schema(TypeCode::String, None))),
            )
            .response(
                "200",
                ResponseBuilder::new()
                    .description("Successful response")
                    .content(JSON, ContentBuilder::new().schema(Some(type_schema(TypeCode::Any, None))).build())
                    .build(),
            )
            .response("204", ResponseBuilder::new().description("Empty result").build());

        if let Some(schema) = command.schema() {
            operation = operation.request_body(Some(
                RequestBodyBuilder::new()
                    .content(JSON, ContentBuilder::new().schema(Some(object_schema(schema))).build())
                    .build(),
            ));
        }

        paths = paths.path(
            append_base_route(base_route, command.name()),
            PathItem::new(HttpMethod::Post, operation.build()),
        );
    }

    let document = OpenApiBuilder::new()
        .info(InfoBuilder::new().title(title).version("1.0.0").build())
        .paths(paths.build())
        .build();

    document.to_pretty_json().map_err(|e| {
        ApplicationError::internal(None, "SERIALIZATION_FAILED", "Failed to render OpenAPI document")
            .with_cause(e)
    })
}

fn object_schema(schema: &ObjectSchema) -> RefOr<Schema> {
    let mut builder = ObjectBuilder::new().schema_type(Type::Object);
    for property in &schema.properties {
        builder = builder.property(
            property.name.clone(),
            type_schema(property.type_code, property.schema.as_ref()),
        );
        if property.required {
            builder = builder.required(property.name.clone());
        }
    }
    RefOr::T(Schema::Object(builder.build()))
}

fn type_schema(type_code: TypeCode, nested: Option<&ObjectSchema>) -> RefOr<Schema> {
    let schema_type = match type_code {
        TypeCode::Any => SchemaType::AnyValue,
        TypeCode::String => SchemaType::Type(Type::String),
        TypeCode::Integer => SchemaType::Type(Type::Integer),
        TypeCode::Float => SchemaType::Type(Type::Number),
        TypeCode::Boolean => SchemaType::Type(Type::Boolean),
        TypeCode::Array => SchemaType::Type(Type::Array),
        TypeCode::Object => match nested {
            Some(nested) => return object_schema(nested),
            None => SchemaType::Type(Type::Object),
        },
    };
    RefOr::T(Schema::Object(ObjectBuilder::new().schema_type(schema_type).build()))
}
